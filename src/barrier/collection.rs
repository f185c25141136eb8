//! Message collections held by a barrier
//!
//! The concrete pattern decides how messages are stored: arrival order for
//! plain aggregation (`Vec<Message>`), sequence order for resequencing
//! ([`SequencedMessages`]).

use crate::barrier::message::Message;
use std::collections::BTreeMap;

/// Storage for the messages collected by one barrier
pub trait MessageCollection: Default + Send + 'static {
    /// Add a message, handing it back if the collection refuses it
    fn add(&mut self, message: Message) -> Result<(), Message>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate in the collection's natural order
    fn iter(&self) -> Box<dyn Iterator<Item = &Message> + '_>;

    /// Remove and return every message in the collection's natural order
    fn drain(&mut self) -> Vec<Message>;
}

impl MessageCollection for Vec<Message> {
    fn add(&mut self, message: Message) -> Result<(), Message> {
        self.push(message);
        Ok(())
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Message> + '_> {
        Box::new(self.as_slice().iter())
    }

    fn drain(&mut self) -> Vec<Message> {
        std::mem::take(self)
    }
}

/// Messages ordered by their `sequence_number` header
///
/// Refuses messages without a sequence number, duplicates of a number
/// already held, and numbers that were already released.
#[derive(Debug, Clone)]
pub struct SequencedMessages {
    messages: BTreeMap<i64, Message>,
    next_expected: i64,
    released: usize,
    expected_size: Option<i64>,
}

impl Default for SequencedMessages {
    fn default() -> Self {
        Self {
            messages: BTreeMap::new(),
            next_expected: 1,
            released: 0,
            expected_size: None,
        }
    }
}

impl SequencedMessages {
    /// Next sequence number that can be released in order
    pub fn next_expected(&self) -> i64 {
        self.next_expected
    }

    /// Number of messages already taken out through [`Self::take_in_order`]
    pub fn released(&self) -> usize {
        self.released
    }

    /// Group size announced by the first message carrying `sequence_size`
    pub fn expected_size(&self) -> Option<i64> {
        self.expected_size
    }

    pub fn contains(&self, sequence_number: i64) -> bool {
        self.messages.contains_key(&sequence_number)
    }

    /// Remove the contiguous run starting at the next expected number
    pub fn take_in_order(&mut self) -> Vec<Message> {
        let mut run = Vec::new();
        while let Some(message) = self.messages.remove(&self.next_expected) {
            run.push(message);
            self.next_expected += 1;
        }
        self.released += run.len();
        run
    }
}

impl MessageCollection for SequencedMessages {
    fn add(&mut self, message: Message) -> Result<(), Message> {
        let sequence_number = match message.header.sequence_number() {
            Some(number) if number >= self.next_expected => number,
            _ => return Err(message),
        };
        if self.messages.contains_key(&sequence_number) {
            return Err(message);
        }
        if self.expected_size.is_none() {
            self.expected_size = message.header.sequence_size();
        }
        self.messages.insert(sequence_number, message);
        Ok(())
    }

    fn len(&self) -> usize {
        self.messages.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Message> + '_> {
        Box::new(self.messages.values())
    }

    fn drain(&mut self) -> Vec<Message> {
        let drained: Vec<Message> = std::mem::take(&mut self.messages).into_values().collect();
        self.released += drained.len();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::message::{SEQUENCE_NUMBER, SEQUENCE_SIZE};

    fn numbered(number: i64) -> Message {
        Message::new(format!("part-{}", number)).with_header(SEQUENCE_NUMBER, number)
    }

    #[test]
    fn test_vec_collection_keeps_arrival_order() {
        let mut collection: Vec<Message> = Vec::new();
        collection.add(Message::new("b")).unwrap();
        collection.add(Message::new("a")).unwrap();

        let payloads: Vec<_> = MessageCollection::iter(&collection)
            .map(|m| m.payload.as_str())
            .collect();
        assert_eq!(payloads, vec!["b", "a"]);

        let drained = MessageCollection::drain(&mut collection);
        assert_eq!(drained.len(), 2);
        assert!(MessageCollection::is_empty(&collection));
    }

    #[test]
    fn test_sequenced_collection_orders_by_sequence_number() {
        let mut collection = SequencedMessages::default();
        collection.add(numbered(3)).unwrap();
        collection.add(numbered(1)).unwrap();
        collection.add(numbered(2)).unwrap();

        let payloads: Vec<_> = collection.iter().map(|m| m.payload.clone()).collect();
        assert_eq!(payloads, vec!["part-1", "part-2", "part-3"]);
    }

    #[test]
    fn test_sequenced_collection_rejects_missing_and_duplicate_numbers() {
        let mut collection = SequencedMessages::default();
        assert!(collection.add(Message::new("no number")).is_err());

        collection.add(numbered(1)).unwrap();
        let rejected = collection.add(numbered(1)).unwrap_err();
        assert_eq!(rejected.payload, "part-1");
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_take_in_order_stops_at_gap() {
        let mut collection = SequencedMessages::default();
        collection
            .add(numbered(1).with_header(SEQUENCE_SIZE, 4i64))
            .unwrap();
        collection.add(numbered(2)).unwrap();
        collection.add(numbered(4)).unwrap();

        let run = collection.take_in_order();
        assert_eq!(run.len(), 2);
        assert_eq!(collection.next_expected(), 3);
        assert_eq!(collection.released(), 2);
        assert_eq!(collection.expected_size(), Some(4));
        assert!(collection.contains(4));

        // Already released numbers are refused
        assert!(collection.add(numbered(2)).is_err());
    }
}
