use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// 32-byte Blake2b variant backing every digest in the system.
type Blake2b256 = Blake2b<U32>;

/// Standard hasher: Blake2b with a 256-bit output.
#[derive(Debug, Default, Clone)]
pub struct Hasher(Blake2b256);

impl Hasher {
    /// Length of the output digest.
    pub const OUTPUT_LEN: usize = 32;

    /// Append data to the hasher.
    pub fn input<B>(&mut self, data: B)
    where
        B: AsRef<[u8]>,
    {
        self.0.update(data)
    }

    /// Consume, append data and return the hasher.
    pub fn chain<B>(mut self, data: B) -> Self
    where
        B: AsRef<[u8]>,
    {
        self.0.update(data);
        self
    }

    /// Consume, append the items of the iterator and return the hasher.
    pub fn extend_chain<B, I>(mut self, iter: I) -> Self
    where
        B: AsRef<[u8]>,
        I: IntoIterator<Item = B>,
    {
        self.extend(iter);
        self
    }

    /// Reset the hasher to the default state.
    pub fn reset(&mut self) {
        self.0.reset();
    }

    /// Consume the hasher, returning the digest.
    pub fn finalize(self) -> [u8; Self::OUTPUT_LEN] {
        self.0.finalize().into()
    }

    /// Hash the provided data, returning its digest.
    pub fn hash<B>(data: B) -> [u8; Self::OUTPUT_LEN]
    where
        B: AsRef<[u8]>,
    {
        let mut hasher = Blake2b256::new();
        hasher.update(data);
        hasher.finalize().into()
    }
}

impl<B> Extend<B> for Hasher
where
    B: AsRef<[u8]>,
{
    fn extend<T: IntoIterator<Item = B>>(&mut self, iter: T) {
        iter.into_iter().for_each(|data| self.input(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_blake2b_256_vector() {
        // Blake2b-256 of the empty input.
        let expected = "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8";
        assert_eq!(hex::encode(Hasher::hash([])), expected);

        // Blake2b-256 of "abc".
        let expected = "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319";
        assert_eq!(hex::encode(Hasher::hash(b"abc")), expected);
    }

    #[test]
    fn chained_input_equals_single_input() {
        let chained = Hasher::default().chain(b"foo").chain(b"bar").finalize();
        let extended = Hasher::default()
            .extend_chain([&b"fo"[..], &b"ob"[..], &b"ar"[..]])
            .finalize();
        assert_eq!(chained, Hasher::hash(b"foobar"));
        assert_eq!(extended, Hasher::hash(b"foobar"));
    }
}
