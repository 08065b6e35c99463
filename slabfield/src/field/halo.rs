//! Neighbour exchange of ghost slices.
use log::trace;

use crate::field::buffer::{TAG_DOWN, TAG_UP};
use crate::field::types::{FieldBuffer, HaloExchange};
use crate::traits::parallel::{Communicator, Element, Incoming, Outgoing};

impl<T, C> FieldBuffer<T, C>
where
    T: Element,
    C: Communicator,
{
    /// Send the outermost owned slices to both neighbours and receive their slices into the
    /// ghosts, all four transfers in flight at once.
    fn exchange_margins(&mut self) {
        if self.margin == 0 {
            return;
        }

        let (lower, upper) = self.neighbours();
        let slice_size = self.decomposition.slice_size();
        let ghost_size = self.margin * slice_size;
        let local_size = self.decomposition.local_size();
        let comm = self.decomposition.comm();

        trace!(
            "rank {} exchanging {} ghost slices with {} and {}",
            comm.rank(),
            self.margin,
            lower,
            upper
        );

        let (lower_ghost, rest) = self.data.split_at_mut(ghost_size);
        let (owned, upper_ghost) = rest.split_at_mut(local_size);

        let sends = [
            Outgoing {
                dest: lower,
                tag: TAG_DOWN,
                data: &owned[..ghost_size],
            },
            Outgoing {
                dest: upper,
                tag: TAG_UP,
                data: &owned[local_size - ghost_size..],
            },
        ];

        let mut receives = [
            Incoming {
                source: upper,
                tag: TAG_DOWN,
                data: upper_ghost,
            },
            Incoming {
                source: lower,
                tag: TAG_UP,
                data: lower_ghost,
            },
        ];

        comm.exchange(&sends, &mut receives);
    }
}

impl<'a, T, C> HaloExchange<'a, T, C>
where
    T: Element,
    C: Communicator,
{
    /// Exchange the margins with the neighbouring ranks, blocking until the ghosts are refreshed.
    pub fn wait(mut self) {
        self.complete();
    }

    fn complete(&mut self) {
        if self.pending {
            self.pending = false;
            self.buffer.exchange_margins();
        }
    }
}

impl<'a, T, C> Drop for HaloExchange<'a, T, C>
where
    T: Element,
    C: Communicator,
{
    fn drop(&mut self) {
        self.complete();
    }
}
