pub mod admin;
pub mod mailer;
pub mod otp;
pub mod poller;
pub mod reconciler;
