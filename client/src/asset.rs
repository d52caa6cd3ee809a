use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use thiserror::Error;

use skein_shared::{Replicated, SpawnOrigin};

/// Components an asset instantiates into, in wire order
pub type AssetComponents = Vec<Box<dyn Replicated>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The resolver has no asset with this id
    #[error("Unknown asset {asset}")]
    UnknownAsset { asset: u32 },

    /// The resolver has no pre-placed scene entity with this id
    #[error("Unknown scene entity {scene_id:#x}")]
    UnknownScene { scene_id: u64 },

    /// The load was dropped before it completed
    #[error("Asset load was abandoned before it completed")]
    Abandoned,

    /// The resolver failed for another reason
    #[error("Asset load failed: {reason}")]
    Failed { reason: String },
}

/// Turns a spawn record's origin into the components of a new entity.
/// Resolution may finish later; the client polls the returned load every
/// tick and never blocks on it.
pub trait AssetResolver {
    fn resolve(&mut self, origin: SpawnOrigin) -> AssetLoad;
}

impl<F> AssetResolver for F
where
    F: FnMut(SpawnOrigin) -> AssetLoad,
{
    fn resolve(&mut self, origin: SpawnOrigin) -> AssetLoad {
        self(origin)
    }
}

/// A possibly unfinished asset resolution
pub struct AssetLoad {
    receiver: Receiver<Result<AssetComponents, AssetError>>,
}

impl AssetLoad {
    /// A load that is already finished
    pub fn ready(result: Result<AssetComponents, AssetError>) -> Self {
        let (load, completer) = Self::pending();
        completer.complete(result);
        load
    }

    /// A load finished later, possibly from another thread, through the
    /// returned completer
    pub fn pending() -> (Self, AssetCompleter) {
        let (sender, receiver) = bounded(1);
        (Self { receiver }, AssetCompleter { sender })
    }

    /// The result once it is available. A completer dropped without
    /// completing yields [`AssetError::Abandoned`].
    pub fn poll(&self) -> Option<Result<AssetComponents, AssetError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AssetError::Abandoned)),
        }
    }
}

/// Finishes an [`AssetLoad`]. Can be sent to a loader thread.
pub struct AssetCompleter {
    sender: Sender<Result<AssetComponents, AssetError>>,
}

impl AssetCompleter {
    pub fn complete(self, result: Result<AssetComponents, AssetError>) {
        // the client may have stopped waiting, which is fine
        let _ = self.sender.send(result);
    }
}
