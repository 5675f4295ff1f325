/**
 * utils/macros.rs
 *
 * Small macros shared by the definitions and the CLI emitter.
 * Everything is bundled in a single file because rust macros don't have namespaces
 *
 **/

/// Pushes `$opt` into `$vec` if it is Some
macro_rules! optionally_push {
    ($vec: ident, $opt: expr) => {
        match $opt {
            Some(v) => $vec.push(v),
            None => {},
        }
    }
}

macro_rules! within_bounds_incl {
    ($low: expr, $num: expr, $high: expr) => {

        $num >= $low && $num <= $high
    }
}

/// Early return with an InvalidDefinition built from a format string
macro_rules! invalid_definition {
    ($($arg:tt)*) => {
        return Err(crate::azuresir::system::InvalidDefinition(format!($($arg)*)))
    }
}
