use super::message::MessageKind;
use super::opcode::Opcode;

/// Splits an outgoing payload into chunks of at most `fragment_size` bytes.
///
/// Every chunk keeps the opcode of the message; only the last one has `fin` set.
/// An empty payload still produces one (empty, final) fragment.
#[derive(Debug)]
pub struct Fragments<'a> {
    payload: &'a [u8],
    opcode: Opcode,
    fragment_size: usize,
    offset: usize,
    done: bool,
}

impl<'a> Fragments<'a> {
    pub fn new(payload: &'a [u8], kind: MessageKind, fragment_size: usize) -> Self {
        let opcode = match kind {
            MessageKind::Text => Opcode::Text,
            MessageKind::Binary => Opcode::Binary,
        };
        Fragments {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = (&'a [u8], Opcode, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let remaining = self.payload.len() - self.offset;
        let take = remaining.min(self.fragment_size);
        let chunk = &self.payload[self.offset..self.offset + take];
        self.offset += take;
        let last = self.offset == self.payload.len();
        self.done = last;
        Some((chunk, self.opcode, last))
    }
}

#[cfg(test)]
#[path = "fragment_test.rs"]
mod tests;
