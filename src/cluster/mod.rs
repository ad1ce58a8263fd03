//! Cluster layer: leader-only writes, forwarding, membership and status

mod forward;
mod reservation;
mod service;

pub use forward::{Forwarder, FORWARDED_HEADER};
pub use reservation::{IdReservations, Reservation};
pub use service::{validate_index_name, ClusterService};
