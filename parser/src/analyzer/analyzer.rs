use crate::packet::Packet;

/// Consumes a packet stream one packet at a time.
pub trait Analyzer {
    fn process(&mut self, packet: &Packet<'_>);
    fn finish(&mut self);
}
