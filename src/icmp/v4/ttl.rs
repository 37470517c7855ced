type TtlInnerType = u8;

/// Time-to-live of an IPv4 datagram.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ttl(pub TtlInnerType);

impl Default for Ttl {
    fn default() -> Self {
        Ttl(64)
    }
}

impl From<TtlInnerType> for Ttl {
    fn from(integer: TtlInnerType) -> Self {
        Ttl(integer)
    }
}

impl From<Ttl> for TtlInnerType {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl std::fmt::Display for Ttl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt() {
        assert_eq!("8", format!("{}", Ttl(8)));
    }

    #[test]
    fn default_is_64() {
        assert_eq!(64u8, Ttl::default().into());
    }
}
