//! Cloudpad Grid: the 8×8 node matrix driven by cluster app events.

pub mod color;
pub mod event;
pub mod grid;
pub mod node;

pub use color::RowColor;
pub use event::{NodeEvent, NodeEventKind, NodeEventReceiver, NodeEventSender};
pub use grid::{ClusterNodeGrid, GridSnapshot, RowSnapshot};
pub use node::{ClusterNode, Phase};
