//! Ports (trait boundaries) for external dependencies.
//!
//! This module defines the interfaces between the inference core and its
//! collaborators. Following hexagonal architecture, these traits are owned by
//! the domain and implemented by adapters in the infrastructure layer.

pub mod participant;
pub mod repository;
pub mod task_farm;

pub use participant::{Participant, ParticipantFactory, ParticipantSpec, TrajectorySimulator};
pub use repository::{ActionValueKey, ActionValueRepository, ResultRepository};
pub use task_farm::{Task, TaskFarm, TaskHandle};
