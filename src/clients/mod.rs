pub mod generation;
pub mod mailer;
