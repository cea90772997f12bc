pub mod ansi;
pub mod prompt;
pub mod session;
pub mod transport;

pub use session::{Session, XmlCollection};
pub use transport::{ScriptedTransport, ShellTransport, Ssh2Transport};
