pub mod address;
pub mod hashes;
pub mod script;
pub mod sighash;
pub mod transaction;

pub use address::{Address, AddressError, AddressVersion, Network};
pub use script::{Opcode, Script, ScriptClass};
pub use sighash::{SighashMode, SighashType};
pub use transaction::{OutPoint, Transaction, TxIn, TxOut};
