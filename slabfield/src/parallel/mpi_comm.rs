//! Implementation of the communication interface for MPI communicators.
use mpi::collective::SystemOperation;
use mpi::topology::{CommunicatorRelation, SimpleCommunicator};
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives, Destination, Root, Source};

use crate::traits::parallel::{Communicator, Element, Incoming, Outgoing, Reducible};

impl Communicator for SimpleCommunicator {
    fn rank(&self) -> i32 {
        MpiCommunicator::rank(self)
    }

    fn size(&self) -> i32 {
        MpiCommunicator::size(self)
    }

    fn duplicate(&self) -> Self {
        MpiCommunicator::duplicate(self)
    }

    fn is_congruent(&self, other: &Self) -> bool {
        matches!(
            self.compare(other),
            CommunicatorRelation::Identical | CommunicatorRelation::Congruent
        )
    }

    fn barrier(&self) {
        CommunicatorCollectives::barrier(self)
    }

    fn all_reduce_sum<T: Reducible>(&self, send: &[T], recv: &mut [T]) {
        self.all_reduce_into(send, recv, SystemOperation::sum());
    }

    fn broadcast_into<T: Element>(&self, root: i32, buf: &mut [T]) {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(buf);
        self.process_at_rank(root).broadcast_into(bytes);
    }

    fn send<T: Element>(&self, dest: i32, tag: i32, buf: &[T]) {
        let bytes: &[u8] = bytemuck::cast_slice(buf);
        self.process_at_rank(dest).send_with_tag(bytes, tag);
    }

    fn receive_into<T: Element>(&self, source: i32, tag: i32, buf: &mut [T]) {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(buf);
        self.process_at_rank(source)
            .receive_into_with_tag(bytes, tag);
    }

    fn exchange<T: Element>(&self, sends: &[Outgoing<'_, T>], receives: &mut [Incoming<'_, T>]) {
        let nreqs = sends.len() + receives.len();

        mpi::request::multiple_scope(nreqs, |scope, coll| {
            for message in sends {
                let bytes: &[u8] = bytemuck::cast_slice(message.data);
                let sreq = self
                    .process_at_rank(message.dest)
                    .immediate_send_with_tag(scope, bytes, message.tag);
                coll.add(sreq);
            }

            for message in receives.iter_mut() {
                let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut *message.data);
                let rreq = self
                    .process_at_rank(message.source)
                    .immediate_receive_into_with_tag(scope, bytes, message.tag);
                coll.add(rreq);
            }

            let mut complete = vec![];
            coll.wait_all(&mut complete);
        });
    }
}
