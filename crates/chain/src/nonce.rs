use crossbeam_channel::{bounded, Receiver, Sender};
use ember_interfaces::pow::PowVerifier;
use ember_primitives::SealedBlock;
use std::{sync::Arc, thread};

/// Verdict of one proof-of-work check within a batch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NonceResult {
    /// Index of the block within the batch.
    pub(crate) index: usize,
    /// Whether the nonce verified.
    pub(crate) valid: bool,
}

/// Verifies the nonces of `blocks` in parallel, reporting one
/// [`NonceResult`] per block on `done`, in completion order.
///
/// A pool of workers (hardware concurrency, clamped to the batch length)
/// consumes indices from a rendezvous feeder. Closing `quit` unblocks the
/// feeder and lets the workers drain and exit; the caller sizes `done` to
/// the batch length so result sends never block.
pub(crate) fn verify_nonces(
    pow: Arc<dyn PowVerifier>,
    blocks: Arc<Vec<Arc<SealedBlock>>>,
    quit: Receiver<()>,
    done: Sender<NonceResult>,
) {
    let workers = thread::available_parallelism().map(usize::from).unwrap_or(1).min(blocks.len());
    let (index_tx, index_rx) = bounded::<usize>(0);

    for _ in 0..workers {
        let pow = pow.clone();
        let blocks = blocks.clone();
        let index_rx = index_rx.clone();
        let done = done.clone();
        let _ = thread::spawn(move || {
            for index in index_rx.iter() {
                let valid = pow.verify(&blocks[index]);
                if done.send(NonceResult { index, valid }).is_err() {
                    return;
                }
            }
        });
    }

    // Feed block indices to the workers until done or told to quit.
    for index in 0..blocks.len() {
        crossbeam_channel::select! {
            send(index_tx, index) -> res => {
                if res.is_err() {
                    return;
                }
            }
            recv(quit) -> _ => return,
        }
    }
}
