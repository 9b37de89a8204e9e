pub mod local;

use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use crate::packet::Packet;

// The Face abstracts away the underlying link. The forwarder only ever
//  pushes packets into it; incoming packets are handed to the forwarder by
//  whoever owns the receiving side.

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceToken(pub(crate) u32);

impl FaceToken {
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face#{}", self.0)
    }
}

impl fmt::Display for FaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceError {
    Disconnected,
    Refused,
}

pub trait Face {
    fn send(&mut self, packet: &Packet) -> Result<(), FaceError>;

    fn is_up(&self) -> bool {
        true
    }
}

pub(crate) struct FaceEntry {
    face: Box<dyn Face>,
    // Number of PIT entries currently holding an out-record on this face
    pending_interests: usize,
}

pub(crate) struct Faces {
    faces: Vec<(u32, FaceEntry)>,
    latest_face_token: u32,
    // Faces whose send reported a disconnect, waiting for the host to remove them
    disconnected: Vec<FaceToken>,
}

impl Faces {
    pub fn new() -> Self {
        Self {
            faces: Default::default(),
            latest_face_token: 0,
            disconnected: Vec::new(),
        }
    }

    pub fn add_face<F>(&mut self, face: F) -> Option<FaceToken>
    where
        F: Face + 'static,
    {
        let token = self.latest_face_token.checked_add(1)?;
        self.latest_face_token = token;
        let entry = FaceEntry {
            face: Box::new(face),
            pending_interests: 0,
        };
        self.faces.push((token, entry));
        Some(FaceToken(token))
    }

    pub fn remove_face(&mut self, token: FaceToken) -> bool {
        self.disconnected.retain(|x| *x != token);
        if let Some(idx) = self.find_face(token) {
            self.faces.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, token: FaceToken) -> bool {
        self.find_face(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn tokens(&self) -> impl Iterator<Item = FaceToken> + '_ {
        self.faces.iter().map(|(token, _)| FaceToken(*token))
    }

    pub fn is_up(&self, token: FaceToken) -> bool {
        match self.find_face(token) {
            Some(idx) => self.faces[idx].1.face.is_up(),
            None => false,
        }
    }

    pub fn send(&mut self, token: FaceToken, packet: &Packet) -> Result<(), FaceError> {
        let idx = self.find_face(token).ok_or(FaceError::Disconnected)?;
        self.faces[idx].1.face.send(packet)
    }

    pub fn pending_interests(&self, token: FaceToken) -> usize {
        match self.find_face(token) {
            Some(idx) => self.faces[idx].1.pending_interests,
            None => 0,
        }
    }

    pub fn add_pending_interest(&mut self, token: FaceToken) {
        if let Some(idx) = self.find_face(token) {
            self.faces[idx].1.pending_interests += 1;
        }
    }

    pub fn release_pending_interest(&mut self, token: FaceToken) {
        if let Some(idx) = self.find_face(token) {
            let entry = &mut self.faces[idx].1;
            entry.pending_interests = entry.pending_interests.saturating_sub(1);
        }
    }

    pub fn mark_disconnected(&mut self, token: FaceToken) {
        if !self.disconnected.contains(&token) {
            self.disconnected.push(token);
        }
    }

    pub fn take_disconnected(&mut self) -> Vec<FaceToken> {
        core::mem::take(&mut self.disconnected)
    }

    fn find_face(&self, token: FaceToken) -> Option<usize> {
        // Can do binary search because we always push higher ids to the end
        self.faces.binary_search_by_key(&token.0, |x| x.0).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{face::local::local_face, name::Name, packet::Interest};

    #[test]
    fn test_faces_registry() {
        let mut faces = Faces::new();
        let (a, mut a_rx) = local_face();
        let (b, b_rx) = local_face();

        let ta = faces.add_face(a).unwrap();
        let tb = faces.add_face(b).unwrap();
        assert!(ta < tb);
        assert_eq!(faces.len(), 2);

        let packet = Packet::Interest(Interest::new(Name::new().adding_generic(b"x"), [0; 4]));
        assert_eq!(faces.send(ta, &packet), Ok(()));
        assert_eq!(a_rx.try_recv(), Ok(Some(packet.clone())));

        // The receiver going away takes the face down
        drop(b_rx);
        assert!(!faces.is_up(tb));
        assert_eq!(faces.send(tb, &packet), Err(FaceError::Disconnected));

        faces.add_pending_interest(ta);
        faces.add_pending_interest(ta);
        faces.release_pending_interest(ta);
        assert_eq!(faces.pending_interests(ta), 1);

        faces.mark_disconnected(tb);
        faces.mark_disconnected(tb);
        assert_eq!(faces.take_disconnected(), [tb]);
        assert!(faces.take_disconnected().is_empty());

        // A face removed after being reported is not reported again
        faces.mark_disconnected(tb);
        assert!(faces.remove_face(tb));
        assert!(faces.take_disconnected().is_empty());

        assert!(faces.remove_face(ta));
        assert!(!faces.remove_face(ta));
        assert!(!faces.contains(ta));
        assert_eq!(faces.send(ta, &packet), Err(FaceError::Disconnected));

        // Tokens are never reused
        let (c, _c_rx) = local_face();
        assert!(faces.add_face(c).unwrap() > tb);
    }
}
