//! Algorithm Negotiation (Component F). Stateless apart from the
//! monotonic `negotiationId` counter, modeled the way this codebase keeps
//! process-wide counters/caches behind a `once_cell::sync::Lazy`.

use crate::error::NegotiationError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEGOTIATION_COUNTER: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyExchange {
    X25519,
    Kyber768,
    Hybrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    Dilithium3,
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub protocol_version: String,
    pub key_exchange: Vec<String>,
    pub signature: Vec<String>,
    pub encryption: Vec<String>,
    pub perfect_forward_secrecy: bool,
    pub post_quantum_ready: bool,
    pub double_ratchet: bool,
    pub minimum_security_level: u8,
    pub quantum_resistant: bool,
    pub hybrid_mode: bool,
}

#[derive(Clone, Debug, Default)]
pub struct NegotiationContext {
    pub require_quantum_resistant: bool,
    pub require_pfs: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NegotiationResult {
    pub key_exchange: String,
    pub signature: Option<String>,
    pub encryption: String,
    pub security_level: u8,
    pub quantum_resistant: bool,
    pub perfect_forward_secrecy: bool,
    pub double_ratchet: bool,
    pub post_quantum: bool,
    pub fallback_available: bool,
    pub upgrade_available: bool,
    pub protocol_version: String,
    pub negotiation_id: String,
    pub timestamp: u64,
}

fn has(list: &[String], value: &str) -> bool {
    list.iter().any(|v| v == value)
}

fn both_support(local: &[String], remote: &[String], value: &str) -> bool {
    has(local, value) && has(remote, value)
}

fn next_negotiation_id() -> String {
    let n = NEGOTIATION_COUNTER.fetch_add(1, Ordering::SeqCst);
    let suffix: String = {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..6)
            .map(|_| {
                let c = rng.gen_range(0..36);
                std::char::from_digit(c, 36).unwrap()
            })
            .collect()
    };
    format!("neg_{n}_{suffix}")
}

/// `negotiate(local, remote, context)`. Selection rules applied in order,
/// first success wins (§4.F).
pub fn negotiate(
    local: &CapabilityDescriptor,
    remote: &CapabilityDescriptor,
    context: &NegotiationContext,
    now_ms: u64,
) -> Result<NegotiationResult, NegotiationError> {
    // 1. Protocol version.
    let protocol_version = std::cmp::min(local.protocol_version.clone(), remote.protocol_version.clone());
    if !crate::constants::SUPPORTED_PROTOCOL_VERSIONS.contains(&protocol_version.as_str()) {
        return Err(NegotiationError::NoCompatibleProtocol);
    }

    // 2. Key exchange, preferred order hybrid > kyber768 > x25519.
    let hybrid_ok = both_support(&local.key_exchange, &remote.key_exchange, "hybrid");
    let kyber_ok = both_support(&local.key_exchange, &remote.key_exchange, "kyber768");
    let x25519_ok = both_support(&local.key_exchange, &remote.key_exchange, "x25519");

    let key_exchange = if hybrid_ok {
        KeyExchange::Hybrid
    } else if kyber_ok {
        KeyExchange::Kyber768
    } else if !context.require_quantum_resistant && x25519_ok {
        KeyExchange::X25519
    } else if context.require_quantum_resistant {
        return Err(NegotiationError::QuantumResistanceUnsatisfiable);
    } else {
        return Err(NegotiationError::QuantumResistanceUnsatisfiable);
    };

    // 3. Signature.
    let signature = if both_support(&local.signature, &remote.signature, "dilithium3") {
        Some(Signature::Dilithium3)
    } else {
        None
    };

    // 4. Encryption.
    if !both_support(&local.encryption, &remote.encryption, "chacha20poly1305") {
        return Err(NegotiationError::NoCompatibleEncryption);
    }

    // 5. Effective security level.
    let requested_level = std::cmp::max(local.minimum_security_level, remote.minimum_security_level);
    let kex_ceiling = match key_exchange {
        KeyExchange::Hybrid | KeyExchange::Kyber768 => 3,
        KeyExchange::X25519 => 1,
    };
    if requested_level > kex_ceiling {
        return Err(NegotiationError::SecurityLevelUnsatisfiable);
    }
    let security_level = requested_level.max(1);

    let quantum_resistant = matches!(key_exchange, KeyExchange::Hybrid | KeyExchange::Kyber768);
    let perfect_forward_secrecy = local.perfect_forward_secrecy && remote.perfect_forward_secrecy;
    let double_ratchet = local.double_ratchet && remote.double_ratchet;
    let post_quantum = local.post_quantum_ready && remote.post_quantum_ready;

    let fallback_available = (hybrid_ok as u8 + kyber_ok as u8 + x25519_ok as u8) > 1;
    let upgrade_available = (local.key_exchange.contains(&"hybrid".to_string())
        || remote.key_exchange.contains(&"hybrid".to_string()))
        && !hybrid_ok;

    Ok(NegotiationResult {
        key_exchange: match key_exchange {
            KeyExchange::Hybrid => "hybrid".into(),
            KeyExchange::Kyber768 => "kyber768".into(),
            KeyExchange::X25519 => "x25519".into(),
        },
        signature: signature.map(|s| match s {
            Signature::Dilithium3 => "dilithium3".into(),
            Signature::None => "none".into(),
        }),
        encryption: "chacha20poly1305".into(),
        security_level,
        quantum_resistant,
        perfect_forward_secrecy,
        double_ratchet,
        post_quantum,
        fallback_available,
        upgrade_available,
        protocol_version,
        negotiation_id: next_negotiation_id(),
        timestamp: now_ms,
    })
}

pub fn are_capabilities_compatible(a: &CapabilityDescriptor, b: &CapabilityDescriptor) -> bool {
    for kex in &a.key_exchange {
        if !b.key_exchange.contains(kex) {
            continue;
        }
        for enc in &a.encryption {
            if b.encryption.contains(enc) {
                return true;
            }
        }
    }
    false
}

pub struct ValidationConstraints {
    pub minimum_security_level: u8,
    pub require_quantum_resistant: bool,
    pub require_pfs: bool,
}

pub fn validate_negotiation_result(result: &NegotiationResult, constraints: &ValidationConstraints) -> bool {
    if result.security_level < constraints.minimum_security_level {
        return false;
    }
    if constraints.require_quantum_resistant && !result.quantum_resistant {
        return false;
    }
    if constraints.require_pfs && !result.perfect_forward_secrecy {
        return false;
    }
    true
}
