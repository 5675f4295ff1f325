use std::io;
use std::io::BufRead;

/// Pause point of the workflow, where the operator may look at the VM before it goes on
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> io::Result<()>;
}

/// Prints the message and waits for a line on stdin
pub struct ConsoleConfirm;

impl Confirm for ConsoleConfirm {
    fn confirm(&mut self, message: &str) -> io::Result<()> {
        print_with_time!("{} Press enter to continue: ", message);
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed while waiting for confirmation"));
        }
        Ok(())
    }
}

/// Never waits
#[derive(Default)]
pub struct AutoConfirm {
    /// Messages seen so far
    pub seen: Vec<String>,
}

impl Confirm for AutoConfirm {
    fn confirm(&mut self, message: &str) -> io::Result<()> {
        println_with_time!("{} (continuing without confirmation)", message);
        self.seen.push(message.to_string());
        Ok(())
    }
}
