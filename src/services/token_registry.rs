use serde::Deserialize;
use std::sync::Arc;

use crate::{
    constants::MAX_WRITE_ATTEMPTS,
    db::Store,
    error::{AppError, Result},
    models::{CustomToken, UserTokens},
    utils::normalize_address,
};

const MAX_SYMBOL_LEN: usize = 11;
const MAX_TOKEN_DECIMALS: u8 = 36;

/// Token as submitted by the client; validated into a [`CustomToken`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToken {
    pub address: String,
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub decimals: u8,
    #[serde(default)]
    pub icon: Option<String>,
}

impl NewToken {
    pub fn validate(self) -> Result<CustomToken> {
        let address = normalize_address(&self.address)?;
        let symbol = self.symbol.trim().to_string();
        if symbol.is_empty() || symbol.chars().count() > MAX_SYMBOL_LEN {
            return Err(AppError::BadRequest(format!(
                "Token symbol must be 1-{} characters",
                MAX_SYMBOL_LEN
            )));
        }
        if self.decimals > MAX_TOKEN_DECIMALS {
            return Err(AppError::BadRequest(format!(
                "Token decimals must not exceed {}",
                MAX_TOKEN_DECIMALS
            )));
        }
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.clone());

        Ok(CustomToken {
            address,
            symbol,
            name,
            decimals: self.decimals,
            icon: self.icon.filter(|i| !i.trim().is_empty()),
        })
    }
}

/// Finds a token by symbol (case-insensitive) or by contract address.
pub fn find_token<'a>(tokens: &'a [CustomToken], query: &str) -> Option<&'a CustomToken> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    tokens
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(query))
        .or_else(|| tokens.iter().find(|t| t.address.eq_ignore_ascii_case(query)))
}

#[derive(Clone)]
pub struct TokenRegistry {
    store: Arc<dyn Store>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_tokens(&self, user_address: &str) -> Result<UserTokens> {
        let user_address = normalize_address(user_address)?;
        self.store.load_tokens(&user_address).await
    }

    pub async fn add_token(&self, user_address: &str, token: NewToken) -> Result<UserTokens> {
        let token = token.validate()?;
        let updated = self
            .update(user_address, |list| {
                if list
                    .tokens
                    .iter()
                    .any(|t| t.address.eq_ignore_ascii_case(&token.address))
                {
                    return Err(AppError::Conflict(format!(
                        "{} is already in your token list",
                        token.address
                    )));
                }
                list.tokens.push(token.clone());
                Ok(())
            })
            .await?;
        tracing::info!(
            "Token {} ({}) added for {}",
            token.symbol,
            token.address,
            updated.user_address
        );
        Ok(updated)
    }

    pub async fn remove_token(&self, user_address: &str, address: &str) -> Result<UserTokens> {
        let address = normalize_address(address)?;
        let updated = self
            .update(user_address, |list| {
                let Some(idx) = list
                    .tokens
                    .iter()
                    .position(|t| t.address.eq_ignore_ascii_case(&address))
                else {
                    return Err(AppError::NotFound(format!(
                        "Token {} is not in your token list",
                        address
                    )));
                };
                if list.tokens.len() == 1 {
                    return Err(AppError::BadRequest(
                        "Cannot remove the last token from your list".to_string(),
                    ));
                }
                list.tokens.remove(idx);
                Ok(())
            })
            .await?;
        tracing::info!("Token {} removed for {}", address, updated.user_address);
        Ok(updated)
    }

    async fn update<F>(&self, user_address: &str, mut mutate: F) -> Result<UserTokens>
    where
        F: FnMut(&mut UserTokens) -> Result<()> + Send,
    {
        let user_address = normalize_address(user_address)?;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut list = self.store.load_tokens(&user_address).await?;
            mutate(&mut list)?;
            if self.store.save_tokens(&list).await? {
                list.version += 1;
                return Ok(list);
            }
            tracing::debug!(
                "Token list for {} changed concurrently (attempt {})",
                user_address,
                attempt
            );
        }
        Err(AppError::Conflict(
            "Token list is being updated elsewhere, please retry".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    const USER: &str = "0xAbC0000000000000000000000000000000000001";
    const AERO: &str = "0x940181a94a35a4569e4529a3cdfb74e38fd98631";

    fn registry() -> TokenRegistry {
        TokenRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn aero() -> NewToken {
        NewToken {
            address: AERO.to_uppercase().replace("0X", "0x"),
            symbol: " AERO ".to_string(),
            name: None,
            decimals: 18,
            icon: None,
        }
    }

    #[tokio::test]
    async fn first_read_seeds_defaults_under_lowercased_address() {
        let list = registry().get_tokens(USER).await.unwrap();
        assert_eq!(list.user_address, USER.to_lowercase());
        assert_eq!(list.tokens.len(), 5);
    }

    #[tokio::test]
    async fn add_token_normalizes_and_rejects_duplicates() {
        let registry = registry();
        let list = registry.add_token(USER, aero()).await.unwrap();
        let added = list.tokens.last().unwrap();
        assert_eq!(added.address, AERO);
        assert_eq!(added.symbol, "AERO");
        assert_eq!(added.name, "AERO");
        assert_eq!(list.version, 1);

        let err = registry.add_token(USER, aero()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn validate_rejects_bad_symbol_and_decimals() {
        let mut token = aero();
        token.symbol = "ABCDEFGHIJKL".to_string();
        assert!(token.validate().is_err());

        let mut token = aero();
        token.decimals = 37;
        assert!(token.validate().is_err());

        let mut token = aero();
        token.address = "0x1234".to_string();
        assert!(token.validate().is_err());
    }

    #[tokio::test]
    async fn remove_token_never_empties_the_list() {
        let registry = registry();
        let list = registry.get_tokens(USER).await.unwrap();
        let addresses: Vec<String> = list.tokens.iter().map(|t| t.address.clone()).collect();

        for address in &addresses[..addresses.len() - 1] {
            registry.remove_token(USER, address).await.unwrap();
        }
        let err = registry
            .remove_token(USER, addresses.last().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(registry.get_tokens(USER).await.unwrap().tokens.len(), 1);
    }

    #[tokio::test]
    async fn remove_unknown_token_is_not_found() {
        let err = registry().remove_token(USER, AERO).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_token_matches_symbol_or_address() {
        let list = registry().get_tokens(USER).await.unwrap();
        assert_eq!(find_token(&list.tokens, "usdc").unwrap().symbol, "USDC");
        assert_eq!(
            find_token(&list.tokens, "0x4200000000000000000000000000000000000006")
                .unwrap()
                .symbol,
            "WETH"
        );
        assert!(find_token(&list.tokens, "PEPE").is_none());
    }
}
