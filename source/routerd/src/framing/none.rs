use super::Framer;

/// Pass-through framer: every read batch is one frame.
pub struct NoneFramer;

impl Framer for NoneFramer {
    fn process<'a>(&'a mut self, data: &'a [u8]) -> (usize, Option<&'a [u8]>) {
        if data.is_empty() {
            (0, None)
        } else {
            (data.len(), Some(data))
        }
    }
}
