//! Implementations of the communication interface.
//!
//! [`LocalCommunicator`] runs every rank as a thread of the current process, and is what the
//! test-suite and the default binary use. With the `mpi` feature enabled the interface is also
//! implemented for `mpi::topology::SimpleCommunicator`.
use crate::traits::parallel::Communicator;
use crate::traits::types::{Result, SlabError};

mod local;
#[cfg(feature = "mpi")]
mod mpi_comm;

pub use local::{run_spmd, LocalCommunicator};

/// Combine the outcome of a step that may fail on some ranks only, so that every rank returns
/// an error if any rank failed. Collective.
pub(crate) fn agree<C: Communicator>(comm: &C, local: Result<()>, what: &str) -> Result<()> {
    let failed = [local.is_err() as i32];
    let mut total = [0i32];
    comm.all_reduce_sum(&failed, &mut total);

    match local {
        Err(e) => Err(e),
        Ok(()) if total[0] > 0 => Err(SlabError::Configuration(format!(
            "{} failed on {} rank(s)",
            what, total[0]
        ))),
        Ok(()) => Ok(()),
    }
}
