// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow graph core for Cinderflow.
//!
//! Graphs are built from nodes with typed input and output ports. Values
//! travel along edges and are converted into the receiving port's type on
//! the way; receiving nodes are woken with an `Activate` event.
//!
//! ## Architecture
//!
//! - [`value`], [`convert`] and [`cell`]: the closed set of port types, the
//!   conversion matrix between them and the per-port value cell
//! - [`custom_data`]: shared, type-erased payloads carried by ports
//! - [`port`], [`config`] and [`registry`]: per-class port descriptors and the
//!   name to factory registry
//! - [`node`] and [`evaluation`]: the node contract and its dispatch context
//! - [`graph`] and [`system`]: signal propagation and the host-side owner
//! - [`serialize`] and [`description`]: runtime state archives and topology
//!   documents
//! - [`nodes`]: the standard node library

pub mod cell;
pub mod config;
pub mod connection;
pub mod convert;
pub mod custom_data;
pub mod description;
pub mod evaluation;
pub mod graph;
pub mod hooks;
pub mod node;
pub mod nodes;
pub mod port;
pub mod registry;
pub mod serialize;
pub mod settings;
pub mod system;
pub mod tokens;
pub mod value;

#[cfg(test)]
mod test_util;

pub use cell::ValueCell;
pub use config::{NodeCategory, NodeConfig, NodeFlags};
pub use connection::{Edge, FlowAddress};
pub use convert::{convert, Conversion, ConversionError, ConversionFailure};
pub use custom_data::{CustomPortData, FlowCustomData};
pub use description::{DescriptionError, GraphDescription};
pub use evaluation::ActivationInfo;
pub use graph::{FlowGraph, GraphId};
pub use hooks::{GraphHook, GraphInspector, HookVerdict};
pub use node::{CreateInfo, FlowEvent, FlowNode, NodeClass, NodeId, NodeLifetime};
pub use port::{InputPortConfig, OutputPortConfig, PortId};
pub use registry::{NodeRegistry, NodeTypeId, RegistryError};
pub use serialize::{Archive, ArchiveError, ArchiveFormat, ArchiveReader, ArchiveWriter, Serializer};
pub use settings::GraphSettings;
pub use system::FlowSystem;
pub use tokens::GraphToken;
pub use value::{DataType, EntityId, FlowPointer, FlowType, FlowValue, PortType, Vec3};
