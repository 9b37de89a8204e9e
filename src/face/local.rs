use alloc::{collections::VecDeque, rc::Rc};
use core::cell::{Cell, RefCell};

use crate::{
    face::{Face, FaceError},
    packet::Packet,
};

pub struct LocalSender {
    inner: Rc<Shared>,
}

pub struct LocalReceiver {
    inner: Rc<Shared>,
}

struct Shared {
    queue: RefCell<VecDeque<Packet>>,
    up: Cell<bool>,
}

pub fn local_face() -> (LocalSender, LocalReceiver) {
    let inner = Rc::new(Shared {
        queue: RefCell::new(VecDeque::new()),
        up: Cell::new(true),
    });

    let sender = LocalSender {
        inner: Rc::clone(&inner),
    };
    let receiver = LocalReceiver { inner };

    (sender, receiver)
}

impl Face for LocalSender {
    fn send(&mut self, packet: &Packet) -> Result<(), FaceError> {
        if Rc::strong_count(&self.inner) <= 1 {
            return Err(FaceError::Disconnected);
        }
        if !self.inner.up.get() {
            return Err(FaceError::Refused);
        }

        self.inner.queue.borrow_mut().push_back(packet.clone());
        Ok(())
    }

    fn is_up(&self) -> bool {
        Rc::strong_count(&self.inner) > 1 && self.inner.up.get()
    }
}

impl LocalReceiver {
    pub fn try_recv(&mut self) -> Result<Option<Packet>, FaceError> {
        let packet = self.inner.queue.borrow_mut().pop_front();

        // We only report the disconnect after draining the available packets
        if packet.is_none() && Rc::strong_count(&self.inner) <= 1 {
            return Err(FaceError::Disconnected);
        }

        Ok(packet)
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    // Administratively brings the link down (or back up) without dropping it
    pub fn set_up(&self, up: bool) {
        self.inner.up.set(up)
    }
}
