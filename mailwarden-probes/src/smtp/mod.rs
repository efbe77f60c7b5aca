//! SMTP-protocol probes: certificate validation over implicit/`STARTTLS`
//! sessions, and the authenticated/unauthenticated conversation probes.

pub mod certificate;
pub mod client;
pub mod conversation;
pub mod response;

pub use certificate::SmtpCertificateProbe;
pub use client::SmtpClient;
pub use conversation::{SmtpAuthenticatedProbe, SmtpUnauthenticatedProbe};
pub use response::Response;
