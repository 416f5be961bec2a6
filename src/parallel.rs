//! Message passing between the ranks of a decomposed run.
//!
//! Each rank owns a part of the mesh. The parts are joined by processor patches, over which
//! the ranks exchange the values of the cells adjacent to the patch faces. Global sums and
//! maxima (e.g. for residual normalisation) are formed with [`all_reduce_sum`] and
//! [`all_reduce_max`].
//!
//! All exchanges go through a [`Transport`]. Without a transport the run is serial, and the
//! reductions return their input unchanged.
use crate::error::ExchangeError;
use crate::Real;
use std::fmt::Debug;

pub mod exchange;
pub mod mailbox;

pub use exchange::ExchangePlan;
pub use mailbox::MailboxTransport;

/// Tag of the messages sent to rank 0 during a reduction.
pub const REDUCE_TAG: usize = 1 << (usize::BITS - 1);
/// Tag of the messages sent from rank 0 at the end of a reduction.
pub const BROADCAST_TAG: usize = REDUCE_TAG + 1;

/// Point-to-point messaging between ranks.
///
/// Messages between the same pair of ranks with the same tag are received in the order
/// they were sent.
pub trait Transport<T>: Debug + Send + Sync {
    fn rank(&self) -> usize;

    fn num_ranks(&self) -> usize;

    fn send(&self, to: usize, tag: usize, data: Vec<T>) -> Result<(), ExchangeError>;

    /// Blocks until a message from `from` with the given tag is available.
    fn receive(&self, from: usize, tag: usize) -> Result<Vec<T>, ExchangeError>;
}

fn all_reduce<T: Real>(
    transport: Option<&dyn Transport<T>>,
    values: &mut [T],
    combine: impl Fn(T, T) -> T,
) -> Result<(), ExchangeError> {
    let transport = match transport {
        Some(transport) if transport.num_ranks() > 1 => transport,
        _ => return Ok(()),
    };

    if transport.rank() == 0 {
        for rank in 1..transport.num_ranks() {
            let contribution = transport.receive(rank, REDUCE_TAG)?;
            if contribution.len() != values.len() {
                return Err(ExchangeError::BufferSizeMismatch {
                    patch: format!("reduction from rank {}", rank),
                    expected: values.len(),
                    actual: contribution.len(),
                });
            }
            for (value, c) in values.iter_mut().zip(contribution) {
                *value = combine(*value, c);
            }
        }
        for rank in 1..transport.num_ranks() {
            transport.send(rank, BROADCAST_TAG, values.to_vec())?;
        }
    } else {
        transport.send(0, REDUCE_TAG, values.to_vec())?;
        let result = transport.receive(0, BROADCAST_TAG)?;
        if result.len() != values.len() {
            return Err(ExchangeError::BufferSizeMismatch {
                patch: "reduction broadcast".to_string(),
                expected: values.len(),
                actual: result.len(),
            });
        }
        values.copy_from_slice(&result);
    }
    Ok(())
}

/// Sums `values` element-wise over all ranks. Every rank receives the result.
pub fn all_reduce_sum<T: Real>(transport: Option<&dyn Transport<T>>, values: &mut [T]) -> Result<(), ExchangeError> {
    all_reduce(transport, values, |a, b| a + b)
}

/// Element-wise maximum over all ranks. Every rank receives the result.
pub fn all_reduce_max<T: Real>(transport: Option<&dyn Transport<T>>, values: &mut [T]) -> Result<(), ExchangeError> {
    all_reduce(transport, values, |a, b| a.max(b))
}
