use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use super::{
    bitset::{BitSet, BitSetError},
    error::Error,
};

#[derive(Debug, Copy, Clone)]
pub enum AllocatorMethod {
    Bit,
}

#[derive(Debug)]
pub enum Allocator {
    Bit(BitAllocator),
}

impl Allocator {
    // host bits
    const MAX_SIZE: u8 = 64;

    pub fn new(cidr: IpNet, method: AllocatorMethod) -> Result<Allocator, Error> {
        if let IpNet::V6(c) = cidr {
            if 128 - c.prefix_len() > Allocator::MAX_SIZE {
                return Err(Error::CIDRTooLarge(c.prefix_len()));
            }
        }
        match method {
            AllocatorMethod::Bit => Ok(Allocator::Bit(BitAllocator::new(cidr))),
        }
    }

    pub fn allocate(&mut self, addr: &IpAddr) -> Result<IpAddr, Error> {
        match self {
            Allocator::Bit(a) => a.allocate(addr),
        }
    }

    pub fn allocate_next(&mut self) -> Result<IpAddr, Error> {
        match self {
            Allocator::Bit(a) => a.allocate_next(),
        }
    }

    pub fn release(&mut self, addr: &IpAddr) -> Result<IpAddr, Error> {
        match self {
            Allocator::Bit(a) => a.release(addr),
        }
    }

    pub fn is_allocated(&self, addr: &IpAddr) -> bool {
        match self {
            Allocator::Bit(a) => a.is_allocated(addr),
        }
    }

    pub fn cidr(&self) -> &IpNet {
        match self {
            Allocator::Bit(a) => &a.cidr,
        }
    }

    pub fn size(&self) -> u128 {
        match self {
            Allocator::Bit(a) => a.size(),
        }
    }

    pub fn free(&self) -> u128 {
        match self {
            Allocator::Bit(a) => a.size() - a.allocated(),
        }
    }
}

#[derive(Debug)]
pub struct BitAllocator {
    cidr: IpNet,
    allocator: BitSet,
}

impl BitAllocator {
    fn new(cidr: IpNet) -> BitAllocator {
        let size = cidr.max_prefix_len() - cidr.prefix_len();
        BitAllocator {
            cidr,
            allocator: BitSet::new(1u128 << size),
        }
    }

    fn size(&self) -> u128 {
        self.allocator.size()
    }

    fn allocated(&self) -> u128 {
        self.allocator.count()
    }

    fn allocate(&mut self, addr: &IpAddr) -> Result<IpAddr, Error> {
        let idx = addr_to_index(addr, &self.cidr)?;
        self.allocator.set_true(idx).map_err(Error::BitSet)?;
        Ok(*addr)
    }

    fn allocate_next(&mut self) -> Result<IpAddr, Error> {
        let index = self.allocator.set_next().map_err(|e| match e {
            BitSetError::Full => Error::Full,
            _ => Error::BitSet(e),
        })?;
        Ok(index_to_addr(index, &self.cidr))
    }

    fn is_allocated(&self, addr: &IpAddr) -> bool {
        match addr_to_index(addr, &self.cidr) {
            Ok(idx) => self.allocator.is_set(idx),
            Err(_) => false,
        }
    }

    fn release(&mut self, addr: &IpAddr) -> Result<IpAddr, Error> {
        let idx = addr_to_index(addr, &self.cidr)?;
        if !self.allocator.is_set(idx) {
            return Err(Error::NoReleasableAddress);
        }
        self.allocator.set(idx, false).map_err(Error::BitSet)?;
        Ok(*addr)
    }
}

fn addr_to_index(addr: &IpAddr, cidr: &IpNet) -> Result<u128, Error> {
    match (cidr, addr) {
        (IpNet::V4(c), IpAddr::V4(a)) => {
            if !c.contains(a) {
                return Err(Error::NotContains);
            }
            Ok((u32::from(*a) - u32::from(c.network())) as u128)
        }
        (IpNet::V6(c), IpAddr::V6(a)) => {
            if !c.contains(a) {
                return Err(Error::NotContains);
            }
            Ok(u128::from(*a) - u128::from(c.network()))
        }
        _ => Err(Error::ProtocolMismatch),
    }
}

fn index_to_addr(index: u128, cidr: &IpNet) -> IpAddr {
    match cidr {
        IpNet::V4(c) => IpAddr::V4(Ipv4Addr::from(u32::from(c.network()) + index as u32)),
        IpNet::V6(c) => IpAddr::V6(Ipv6Addr::from(u128::from(c.network()) + index)),
    }
}
