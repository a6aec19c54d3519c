// Copyright (c) 2022-2023 The FIO Protocol Developers

/// encdec helper module for fixed length byte arrays
pub(crate) mod arr {
    use crate::ApduError;

    pub fn enc<const N: usize>(d: &[u8; N], buff: &mut [u8]) -> Result<usize, ApduError> {
        if buff.len() < d.len() {
            return Err(ApduError::InvalidLength);
        }

        buff[..d.len()].copy_from_slice(&d[..]);

        Ok(d.len())
    }

    pub fn enc_len<const N: usize>(d: &[u8; N]) -> Result<usize, ApduError> {
        Ok(d.len())
    }

    pub fn dec<const N: usize>(buff: &[u8]) -> Result<([u8; N], usize), ApduError> {
        if buff.len() < N {
            return Err(ApduError::InvalidLength);
        }

        let mut d = [0u8; N];
        d.copy_from_slice(&buff[..N]);

        Ok((d, N))
    }
}

/// encdec helper module for length-prefixed UTF-8 strings
pub(crate) mod lp_str {
    use crate::ApduError;

    pub fn enc(s: &str, buff: &mut [u8]) -> Result<usize, ApduError> {
        let b = s.as_bytes();

        if b.len() > u8::MAX as usize || buff.len() < b.len() + 1 {
            return Err(ApduError::InvalidLength);
        }

        buff[0] = b.len() as u8;
        buff[1..][..b.len()].copy_from_slice(b);

        Ok(b.len() + 1)
    }

    pub fn enc_len(s: &str) -> Result<usize, ApduError> {
        Ok(s.len() + 1)
    }

    pub fn dec(buff: &[u8]) -> Result<(&str, usize), ApduError> {
        if buff.is_empty() {
            return Err(ApduError::InvalidLength);
        }

        let n = buff[0] as usize;
        if buff.len() < n + 1 {
            return Err(ApduError::InvalidLength);
        }

        let s = core::str::from_utf8(&buff[1..][..n]).map_err(|_| ApduError::InvalidEncoding)?;

        Ok((s, n + 1))
    }
}
