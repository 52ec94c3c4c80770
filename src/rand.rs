/// Pseudo-random source used for announcement jitter.
///
/// Every node owns one, seeded from something that differs between nodes (e.g. the EUI-64),
/// so that neighbouring nodes do not announce in lockstep.
#[derive(Debug, Clone)]
pub struct Rand {
    state: u64,
}

impl Rand {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seed from an extended (EUI-64) address.
    pub fn from_eui64(eui64: [u8; 8]) -> Self {
        Self::new(u64::from_be_bytes(eui64))
    }

    pub fn rand_u32(&mut self) -> u32 {
        // sPCG32 from https://www.pcg-random.org/paper.html
        // see also https://nullprogram.com/blog/2017/09/21/
        const M: u64 = 0xbb2efcec3c39611d;
        const A: u64 = 0x7590ef39;

        let s = self.state.wrapping_mul(M).wrapping_add(A);
        self.state = s;

        let shift = 29 - (s >> 61);
        (s >> shift) as u32
    }

    pub fn rand_u16(&mut self) -> u16 {
        let n = self.rand_u32();
        (n ^ (n >> 16)) as u16
    }
}
