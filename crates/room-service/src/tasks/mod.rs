//! Background tasks.

pub mod pending_room_sweeper;

pub use pending_room_sweeper::start_pending_room_sweeper;
