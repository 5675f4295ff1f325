macro_rules! println_with_time {

    () => { println!(); };
    ($($arg:tt)*) => {
        println!("{} ~ {}", chrono::Local::now().format("%H:%M:%S"), format!($($arg)*))
    }
}

/// Same as println_with_time but without the trailing newline, for prompts
macro_rules! print_with_time {
    ($($arg:tt)*) => {
        {
            use std::io::Write;
            print!("{} ~ {}", chrono::Local::now().format("%H:%M:%S"), format!($($arg)*));
            let _ = std::io::stdout().flush();
        }
    }
}

/// Logs an error followed by every error in its source chain
macro_rules! log_error {
    ($err: expr) => {
        {
            let err: &dyn std::error::Error = &$err;
            println_with_time!("Error: {}", err);
            let mut source = err.source();
            while let Some(cause) = source {
                println_with_time!("  caused by: {}", cause);
                source = cause.source();
            }
        }
    }
}
