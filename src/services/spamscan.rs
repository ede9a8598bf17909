//! SpamScan: kills new users matching configured masks or keywords.

use super::traits::{NewUser, ServiceModule};
use crate::config::SpamScanConfig;
use crate::error::LinkError;
use crate::security::WildcardMask;
use crate::sync::context::LinkContext;
use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use tracing::{info, warn};

pub struct SpamScan {
    config: SpamScanConfig,
    numeric: Option<String>,
    masks: Vec<WildcardMask>,
    /// Realname keyword matcher. `None` when no keywords are configured.
    keywords: Option<AhoCorasick>,
}

impl SpamScan {
    pub fn new(config: SpamScanConfig) -> Self {
        let masks = config.masks.iter().map(|m| WildcardMask::new(m)).collect();
        let keywords = if config.keywords.is_empty() {
            None
        } else {
            match AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(&config.keywords)
            {
                Ok(matcher) => Some(matcher),
                Err(err) => {
                    warn!(error = ?err, "Failed to build spam keyword matcher; keyword matching disabled");
                    None
                }
            }
        };
        Self {
            config,
            numeric: None,
            masks,
            keywords,
        }
    }

    /// Why `user` should be killed, if it should.
    pub fn check(&self, user: &NewUser<'_>) -> Option<String> {
        let mask = user.mask();
        if let Some(hit) = self.masks.iter().find(|m| m.matches(&mask)) {
            return Some(format!("mask {}", hit.as_str()));
        }
        let matcher = self.keywords.as_ref()?;
        let found = matcher.find(user.realname)?;
        Some(format!("keyword {}", &user.realname[found.range()]))
    }
}

#[async_trait]
impl ServiceModule for SpamScan {
    fn name(&self) -> &'static str {
        "spamscan"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn handshake(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        let numeric = ctx
            .introduce_client(
                &self.config.nick,
                &self.config.ident,
                &self.config.host,
                "Spam Scanner",
            )
            .await?;
        self.numeric = Some(numeric);
        Ok(())
    }

    async fn handle_new_user(
        &mut self,
        ctx: &LinkContext,
        user: &NewUser<'_>,
    ) -> Result<bool, LinkError> {
        let Some(matched) = self.check(user) else {
            return Ok(false);
        };
        let source = self.numeric.as_deref().unwrap_or(ctx.numeric.as_str());
        info!(nick = %user.nick, numeric = %user.numeric, matched = %matched, "Killing spam client");
        ctx.send(format!(
            "{} D {} :{} ({})",
            source, user.numeric, ctx.server_name, self.config.reason
        ))
        .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::context::testing::test_link;

    fn new_user<'a>(nick: &'a str, host: &'a str, realname: &'a str) -> NewUser<'a> {
        NewUser {
            numeric: "ABAAA",
            nick,
            ident: "ident",
            host,
            account: None,
            hidden_host: None,
            realname,
        }
    }

    fn scanner() -> SpamScan {
        SpamScan::new(SpamScanConfig {
            enabled: true,
            masks: vec!["*!*@*.spam.example".into()],
            keywords: vec!["cheap pills".into()],
            ..SpamScanConfig::default()
        })
    }

    #[test]
    fn mask_and_keyword_matches() {
        let scan = scanner();
        assert_eq!(
            scan.check(&new_user("Bot", "node1.SPAM.example", "x")).as_deref(),
            Some("mask *!*@*.spam.example")
        );
        assert_eq!(
            scan.check(&new_user("Bot", "clean.example", "Buy CHEAP PILLS now")).as_deref(),
            Some("keyword CHEAP PILLS")
        );
        assert!(scan.check(&new_user("Nick", "clean.example", "Real Name")).is_none());
    }

    #[tokio::test]
    async fn match_kills_and_reports_handled() {
        let link = test_link();
        let mut scan = scanner();
        scan.handshake(&link.ctx).await.unwrap();
        link.writer.take();

        let handled = scan
            .handle_new_user(&link.ctx, &new_user("Bot", "a.spam.example", "x"))
            .await
            .unwrap();
        assert!(handled);
        assert_eq!(
            link.writer.lines(),
            vec!["ASAAA D ABAAA :services.example.net (Spam is not welcome on this network)".to_string()]
        );

        let handled = scan
            .handle_new_user(&link.ctx, &new_user("Nick", "clean.example", "Real"))
            .await
            .unwrap();
        assert!(!handled);
    }
}
