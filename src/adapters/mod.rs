//! Adapters implementing domain ports.
//!
//! This module contains infrastructure implementations of the traits defined
//! in the ports module. Following hexagonal architecture, adapters depend on
//! domain ports, not the other way around.

pub mod in_memory_repository;
pub mod msgpack_repository;
pub mod tabular_participant;
pub mod task_farm;

pub use in_memory_repository::InMemoryRepository;
pub use msgpack_repository::{MsgPackActionValueStore, MsgPackRepository};
pub use tabular_participant::{TabularParticipant, TabularParticipantFactory};
pub use task_farm::{RayonFarm, SequentialFarm};
