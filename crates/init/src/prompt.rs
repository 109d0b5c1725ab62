use crate::InitError;

/// Yes/no questions asked during init.
pub trait Confirmer {
    fn confirm(&self, message: &str, default: bool) -> Result<bool, InitError>;
}

/// Asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, message: &str, default: bool) -> Result<bool, InitError> {
        Ok(inquire::Confirm::new(message)
            .with_default(default)
            .prompt()?)
    }
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirmer for FixedAnswer {
    fn confirm(&self, _message: &str, _default: bool) -> Result<bool, InitError> {
        Ok(self.0)
    }
}
