//! In-process transport, with one handle per rank.
use crate::error::ExchangeError;
use crate::parallel::Transport;
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Queues<T> = HashMap<(usize, usize, usize), VecDeque<Vec<T>>>;

struct Mailbox<T> {
    num_ranks: usize,
    // Keyed by (from, to, tag)
    queues: Mutex<Queues<T>>,
    delivered: Condvar,
}

/// Transport between ranks running as threads of the same process.
///
/// All handles created by [`create_ranks`](Self::create_ranks) share one mailbox. Sends never
/// block, receives block until a matching message arrives or the timeout expires.
pub struct MailboxTransport<T> {
    rank: usize,
    mailbox: Arc<Mailbox<T>>,
    timeout: Duration,
}

impl<T> Clone for MailboxTransport<T> {
    fn clone(&self) -> Self {
        Self {
            rank: self.rank,
            mailbox: Arc::clone(&self.mailbox),
            timeout: self.timeout,
        }
    }
}

impl<T> Debug for MailboxTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxTransport")
            .field("rank", &self.rank)
            .field("num_ranks", &self.mailbox.num_ranks)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<T> MailboxTransport<T> {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates the handles of `num_ranks` ranks, ordered by rank.
    pub fn create_ranks(num_ranks: usize) -> Vec<Self> {
        assert!(num_ranks > 0, "At least one rank is required");
        let mailbox = Arc::new(Mailbox {
            num_ranks,
            queues: Mutex::new(HashMap::new()),
            delivered: Condvar::new(),
        });
        (0..num_ranks)
            .map(|rank| Self {
                rank,
                mailbox: Arc::clone(&mailbox),
                timeout: Self::DEFAULT_TIMEOUT,
            })
            .collect()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_rank(&self, rank: usize) -> Result<(), ExchangeError> {
        if rank < self.mailbox.num_ranks {
            Ok(())
        } else {
            Err(ExchangeError::RankOutOfRange {
                rank,
                num_ranks: self.mailbox.num_ranks,
            })
        }
    }
}

impl<T: Send> Transport<T> for MailboxTransport<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.mailbox.num_ranks
    }

    fn send(&self, to: usize, tag: usize, data: Vec<T>) -> Result<(), ExchangeError> {
        self.check_rank(to)?;
        trace!("Rank {} sends {} values to rank {} (tag {})", self.rank, data.len(), to, tag);
        let mut queues = self.mailbox.queues.lock();
        queues
            .entry((self.rank, to, tag))
            .or_default()
            .push_back(data);
        self.mailbox.delivered.notify_all();
        Ok(())
    }

    fn receive(&self, from: usize, tag: usize) -> Result<Vec<T>, ExchangeError> {
        self.check_rank(from)?;
        let key = (from, self.rank, tag);
        let deadline = Instant::now() + self.timeout;
        let mut queues = self.mailbox.queues.lock();
        loop {
            if let Some(data) = queues.get_mut(&key).and_then(VecDeque::pop_front) {
                trace!("Rank {} received {} values from rank {} (tag {})", self.rank, data.len(), from, tag);
                return Ok(data);
            }
            if self
                .mailbox
                .delivered
                .wait_until(&mut queues, deadline)
                .timed_out()
            {
                // A message may have arrived together with the timeout
                if let Some(data) = queues.get_mut(&key).and_then(VecDeque::pop_front) {
                    return Ok(data);
                }
                return Err(ExchangeError::Timeout {
                    from,
                    to: self.rank,
                    tag,
                });
            }
        }
    }
}
