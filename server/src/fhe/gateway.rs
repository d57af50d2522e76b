//! User decryption gateway
//!
//! Releases plaintexts to a user who signed a [`DecryptionAuthorization`]
//! covering the handle's contract, provided both the user and the contract
//! are on the handle's ACL. Requests are all-or-nothing.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::{Coprocessor, FheError, FheResult};
use crate::messages::{authorization_message, recover_signer, DecryptionAuthorization};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: B256,
    pub contract: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedValue {
    pub handle: B256,
    pub value: u32,
}

pub struct Gateway {
    chain_id: u64,
    max_authorization_days: u32,
}

impl Gateway {
    pub fn new(chain_id: u64, max_authorization_days: u32) -> Self {
        Self {
            chain_id,
            max_authorization_days,
        }
    }

    pub fn user_decrypt(
        &self,
        coprocessor: &Coprocessor,
        pairs: &[HandleContractPair],
        user: Address,
        authorization: &DecryptionAuthorization,
        signature: &[u8],
        now: i64,
    ) -> FheResult<Vec<DecryptedValue>> {
        if pairs.is_empty() {
            return Err(FheError::EmptyRequest);
        }

        self.check_authorization(user, authorization, signature, now)?;

        // Check every pair before releasing anything
        for pair in pairs {
            if !authorization.contracts.contains(&pair.contract) {
                return Err(FheError::ContractNotAuthorized(pair.contract));
            }
            for account in [pair.contract, user] {
                if !coprocessor.is_allowed(pair.handle, account) {
                    return Err(FheError::NotAllowed {
                        handle: pair.handle,
                        account,
                    });
                }
            }
        }

        let values = pairs
            .iter()
            .map(|pair| {
                coprocessor.reveal(pair.handle).map(|value| DecryptedValue {
                    handle: pair.handle,
                    value,
                })
            })
            .collect::<FheResult<Vec<_>>>()?;

        tracing::info!("Served user decryption of {} handle(s) for {}", values.len(), user);

        Ok(values)
    }

    fn check_authorization(
        &self,
        user: Address,
        authorization: &DecryptionAuthorization,
        signature: &[u8],
        now: i64,
    ) -> FheResult<()> {
        if authorization.duration_days > self.max_authorization_days {
            return Err(FheError::AuthorizationTooLong {
                requested: authorization.duration_days,
                max: self.max_authorization_days,
            });
        }
        if !authorization.is_valid_at(now) {
            return Err(FheError::AuthorizationExpired);
        }

        let message = authorization_message(self.chain_id, user, authorization);
        let signer = recover_signer(&message, signature).map_err(FheError::InvalidSignature)?;
        if signer != user {
            return Err(FheError::InvalidSignature(format!(
                "signed by {}, expected {}",
                signer, user
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    const ALICE_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const MALLORY_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";
    const NOW: i64 = 1_700_000_000;

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    fn sign(signer: &PrivateKeySigner, auth: &DecryptionAuthorization) -> Vec<u8> {
        let message = authorization_message(31337, signer.address(), auth);
        signer
            .sign_message_sync(message.as_bytes())
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    fn authorization() -> DecryptionAuthorization {
        DecryptionAuthorization {
            contracts: vec![contract()],
            start_timestamp: NOW - 10,
            duration_days: 1,
        }
    }

    /// Coprocessor holding `value` for `user`, allowed for the contract and user
    fn setup(user: Address, value: u32) -> (Coprocessor, B256) {
        let mut fhe = Coprocessor::new("seed", 31337);
        let input = fhe.encrypt_input(contract(), user, value);
        fhe.allow_this(input.handle, contract()).unwrap();
        fhe.allow(contract(), input.handle, user).unwrap();
        (fhe, input.handle)
    }

    #[test]
    fn test_owner_decrypts() {
        let alice: PrivateKeySigner = ALICE_KEY.parse().unwrap();
        let (fhe, handle) = setup(alice.address(), 2500);
        let auth = authorization();

        let values = Gateway::new(31337, 365)
            .user_decrypt(
                &fhe,
                &[HandleContractPair {
                    handle,
                    contract: contract(),
                }],
                alice.address(),
                &auth,
                &sign(&alice, &auth),
                NOW,
            )
            .unwrap();

        assert_eq!(values, vec![DecryptedValue { handle, value: 2500 }]);
    }

    #[test]
    fn test_rejects_signature_from_someone_else() {
        let alice: PrivateKeySigner = ALICE_KEY.parse().unwrap();
        let mallory: PrivateKeySigner = MALLORY_KEY.parse().unwrap();
        let (fhe, handle) = setup(alice.address(), 1);
        let auth = authorization();

        let result = Gateway::new(31337, 365).user_decrypt(
            &fhe,
            &[HandleContractPair {
                handle,
                contract: contract(),
            }],
            alice.address(),
            &auth,
            &sign(&mallory, &auth),
            NOW,
        );

        assert!(matches!(result, Err(FheError::InvalidSignature(_))));
    }

    #[test]
    fn test_rejects_user_not_on_acl() {
        let alice: PrivateKeySigner = ALICE_KEY.parse().unwrap();
        let mallory: PrivateKeySigner = MALLORY_KEY.parse().unwrap();
        let (fhe, handle) = setup(alice.address(), 1);
        let auth = authorization();

        let result = Gateway::new(31337, 365).user_decrypt(
            &fhe,
            &[HandleContractPair {
                handle,
                contract: contract(),
            }],
            mallory.address(),
            &auth,
            &sign(&mallory, &auth),
            NOW,
        );

        assert_eq!(
            result,
            Err(FheError::NotAllowed {
                handle,
                account: mallory.address()
            })
        );
    }

    #[test]
    fn test_rejects_expired_and_overlong_authorizations() {
        let alice: PrivateKeySigner = ALICE_KEY.parse().unwrap();
        let (fhe, handle) = setup(alice.address(), 1);
        let pairs = [HandleContractPair {
            handle,
            contract: contract(),
        }];
        let gateway = Gateway::new(31337, 30);

        let expired = DecryptionAuthorization {
            start_timestamp: NOW - 2 * 86_400,
            ..authorization()
        };
        assert_eq!(
            gateway.user_decrypt(&fhe, &pairs, alice.address(), &expired, &sign(&alice, &expired), NOW),
            Err(FheError::AuthorizationExpired)
        );

        let overlong = DecryptionAuthorization {
            duration_days: 31,
            ..authorization()
        };
        assert_eq!(
            gateway.user_decrypt(&fhe, &pairs, alice.address(), &overlong, &sign(&alice, &overlong), NOW),
            Err(FheError::AuthorizationTooLong {
                requested: 31,
                max: 30
            })
        );
    }

    #[test]
    fn test_rejects_contract_outside_authorization() {
        let alice: PrivateKeySigner = ALICE_KEY.parse().unwrap();
        let (fhe, handle) = setup(alice.address(), 1);
        let auth = DecryptionAuthorization {
            contracts: vec![Address::repeat_byte(0x11)],
            ..authorization()
        };

        let result = Gateway::new(31337, 365).user_decrypt(
            &fhe,
            &[HandleContractPair {
                handle,
                contract: contract(),
            }],
            alice.address(),
            &auth,
            &sign(&alice, &auth),
            NOW,
        );

        assert_eq!(result, Err(FheError::ContractNotAuthorized(contract())));
    }

    #[test]
    fn test_empty_request() {
        let alice: PrivateKeySigner = ALICE_KEY.parse().unwrap();
        let (fhe, _) = setup(alice.address(), 1);
        let auth = authorization();

        assert_eq!(
            Gateway::new(31337, 365).user_decrypt(&fhe, &[], alice.address(), &auth, &sign(&alice, &auth), NOW),
            Err(FheError::EmptyRequest)
        );
    }
}
