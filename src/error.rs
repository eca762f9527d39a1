use thiserror::Error as ThisError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// A checked lookup asked for a key the tree does not hold.
    #[error("key not found")]
    KeyNotFound,
}
