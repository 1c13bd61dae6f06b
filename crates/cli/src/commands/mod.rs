pub mod init;
pub mod inspect;
pub mod run;
pub mod runs;
pub mod status;

pub use init::*;
pub use inspect::*;
pub use run::*;
pub use runs::*;
pub use status::*;
