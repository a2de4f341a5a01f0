use anyhow::Result;
use tracing::{debug, info, warn};

use crate::compose;
use crate::config::ReplyConfig;
use crate::extract;
use crate::platform::{IncomingMessage, OutboundReply};
use crate::registry::{BikeRecord, RegistryClient};

/// Serial value the registry stores for bikes registered without one.
/// Looking it up would match every such record, so it gets a canned answer.
const OPT_OUT_SERIAL: &str = "absent";

/// Largest exact-match result set that still gets per-bike replies; anything
/// bigger is answered with a single link into the search results.
const MAX_DETAILED_MATCHES: usize = 3;

/// The core processor: takes one mention, decides what to answer.
/// Platform-agnostic; receives an IncomingMessage, returns the replies.
pub struct Watcher {
    registry: RegistryClient,
    reply: ReplyConfig,
    self_handle: String,
}

impl Watcher {
    pub fn new(registry: RegistryClient, reply: ReplyConfig, self_handle: String) -> Self {
        Self {
            registry,
            reply,
            self_handle,
        }
    }

    /// Process one mention to completion and return the replies to send.
    /// An error here means this mention is skipped; it is never retried.
    pub async fn process_message(&self, message: &IncomingMessage) -> Result<Vec<OutboundReply>> {
        if message.is_repost || message.author_handle.eq_ignore_ascii_case(&self.self_handle) {
            debug!("Ignoring repost or own message {}", message.id);
            return Ok(Vec::new());
        }

        let term = extract::search_term(&message.text, &message.mentions, &message.hashtags);
        if term.is_empty() {
            debug!("Mention {} left no search term", message.id);
            return Ok(Vec::new());
        }
        if term.eq_ignore_ascii_case(OPT_OUT_SERIAL) {
            return Ok(vec![self.absent_serial_reply(message)]);
        }

        info!("Searching registry for {:?} (mention {})", term, message.id);
        let bikes = self.registry.search(&term).await?;

        if bikes.is_empty() {
            match self.registry.close_serials(&term).await {
                Ok(close) if !close.is_empty() => {
                    return Ok(vec![self.close_matches_reply(message, &term, close.len())]);
                }
                Ok(_) => {}
                Err(e) => warn!("Close-serial lookup failed for {:?}: {:#}", term, e),
            }
        }

        Ok(self.plan_replies(message, &term, &bikes))
    }

    /// Turn an exact-match result set into replies. No I/O happens here, so
    /// every outcome branch is checkable against fixture records.
    fn plan_replies(
        &self,
        message: &IncomingMessage,
        term: &str,
        bikes: &[BikeRecord],
    ) -> Vec<OutboundReply> {
        let handle = format!("@{}", message.author_handle);

        match bikes.len() {
            0 => vec![OutboundReply {
                text: format!(
                    "Sorry {}, I couldn't find that bike on the Bike Index {}",
                    handle,
                    self.search_link(term)
                ),
                in_reply_to: message.id,
                media_url: None,
            }],
            1..=MAX_DETAILED_MATCHES => {
                let mut replies = Vec::new();
                if bikes.len() > 1 {
                    replies.push(OutboundReply {
                        text: format!("{} Found {} bikes matching that serial:", handle, bikes.len()),
                        in_reply_to: message.id,
                        media_url: None,
                    });
                }
                for bike in bikes {
                    match compose::found_reply(&self.reply, &handle, bike) {
                        Ok((text, media_url)) => replies.push(OutboundReply {
                            text,
                            in_reply_to: message.id,
                            media_url,
                        }),
                        Err(e) => warn!("Not describing bike {:?}: {}", bike.serial, e),
                    }
                }
                replies
            }
            n => vec![OutboundReply {
                text: format!(
                    "{} Found {} bikes matching that serial, see them all: {}",
                    handle,
                    n,
                    self.search_link(term)
                ),
                in_reply_to: message.id,
                media_url: None,
            }],
        }
    }

    fn absent_serial_reply(&self, message: &IncomingMessage) -> OutboundReply {
        OutboundReply {
            text: format!(
                "@{} Bikes registered with an absent serial can't be looked up by number. \
                 You can browse the registry at {}",
                message.author_handle, self.reply.search_url
            ),
            in_reply_to: message.id,
            media_url: None,
        }
    }

    fn close_matches_reply(
        &self,
        message: &IncomingMessage,
        term: &str,
        count: usize,
    ) -> OutboundReply {
        OutboundReply {
            text: format!(
                "@{} No exact match for that serial, but {} close {} registered: {}",
                message.author_handle,
                count,
                if count == 1 { "serial is" } else { "serials are" },
                self.search_link(term)
            ),
            in_reply_to: message.id,
            media_url: None,
        }
    }

    /// Search-results link with the term as an encoded query parameter.
    fn search_link(&self, term: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        format!("{}&serial={}", self.reply.search_url, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;

    fn make_watcher() -> Watcher {
        Watcher::new(
            RegistryClient::new(RegistryConfig::default()),
            ReplyConfig::default(),
            "stolenwatch".to_string(),
        )
    }

    fn make_message(text: &str) -> IncomingMessage {
        IncomingMessage {
            id: 900,
            text: text.to_string(),
            author_id: 42,
            author_handle: "casey".to_string(),
            created_at: None,
            mentions: Vec::new(),
            hashtags: Vec::new(),
            is_repost: false,
        }
    }

    fn make_bike(serial: &str, color: &str, manufacturer: &str, model: &str) -> BikeRecord {
        BikeRecord {
            serial: serial.to_string(),
            frame_colors: vec![color.to_string()],
            manufacturer_name: Some(manufacturer.to_string()),
            frame_model: Some(model.to_string()),
            stolen: true,
            url: Some(format!("https://bikeindex.org/bikes/{serial}")),
            large_img: None,
        }
    }

    #[test]
    fn test_zero_results_links_the_search_page() {
        let watcher = make_watcher();
        let replies = watcher.plan_replies(&make_message("x"), "WTU171C0193K", &[]);

        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.starts_with("Sorry @casey, I couldn't find that bike"));
        assert!(replies[0].text.ends_with("&serial=WTU171C0193K"));
        assert_eq!(replies[0].in_reply_to, 900);
    }

    #[test]
    fn test_search_link_encodes_the_term() {
        let watcher = make_watcher();
        let replies = watcher.plan_replies(&make_message("x"), "AB 12&3", &[]);
        assert!(replies[0].text.ends_with("&serial=AB+12%263"));
    }

    #[test]
    fn test_single_stolen_match_gets_a_composed_reply() {
        let watcher = make_watcher();
        let bikes = vec![make_bike("1234", "Silver", "Trek", "520")];
        let replies = watcher.plan_replies(&make_message("x"), "1234", &bikes);

        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].text,
            "@casey Found gray Trek 520 listed as STOLEN https://bikeindex.org/bikes/1234"
        );
    }

    #[test]
    fn test_small_result_set_gets_summary_plus_per_bike_replies() {
        let watcher = make_watcher();
        let bikes = vec![
            make_bike("a1", "Red", "Trek", "520"),
            make_bike("a2", "Blue", "Kona", "Unit"),
            make_bike("a3", "Black", "Surly", "Straggler"),
        ];
        let replies = watcher.plan_replies(&make_message("x"), "a", &bikes);

        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0].text, "@casey Found 3 bikes matching that serial:");
        assert!(replies[1].text.contains("red Trek 520"));
        assert!(replies[3].text.contains("black Surly Straggler"));
    }

    #[test]
    fn test_large_result_set_gets_one_summary_link() {
        let watcher = make_watcher();
        let bikes: Vec<BikeRecord> = (0..5)
            .map(|i| make_bike(&format!("sn{i}"), "Red", "Trek", "520"))
            .collect();
        let replies = watcher.plan_replies(&make_message("x"), "sn", &bikes);

        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.contains("Found 5 bikes matching that serial"));
        assert!(replies[0].text.contains("&serial=sn"));
    }

    #[test]
    fn test_invalid_record_is_skipped_but_siblings_still_answered() {
        let watcher = make_watcher();
        let mut broken = make_bike("b1", "Red", "Trek", "520");
        broken.frame_colors.clear();
        let bikes = vec![broken, make_bike("b2", "Blue", "Kona", "Unit")];
        let replies = watcher.plan_replies(&make_message("x"), "b", &bikes);

        // summary plus the one valid record
        assert_eq!(replies.len(), 2);
        assert!(replies[1].text.contains("blue Kona Unit"));
    }

    #[tokio::test]
    async fn test_own_messages_and_reposts_are_ignored() {
        let watcher = make_watcher();

        let mut own = make_message("SN123");
        own.author_handle = "StolenWatch".to_string();
        assert!(watcher.process_message(&own).await.unwrap().is_empty());

        let mut repost = make_message("SN123");
        repost.is_repost = true;
        assert!(watcher.process_message(&repost).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_term_is_ignored() {
        let watcher = make_watcher();
        let mut message = make_message("@stolenwatch");
        message.mentions.push(crate::platform::EntitySpan::new(0, 12));
        assert!(watcher.process_message(&message).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_absent_serial_short_circuits_without_a_lookup() {
        let watcher = make_watcher();
        let replies = watcher
            .process_message(&make_message("  Absent "))
            .await
            .unwrap();

        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.starts_with("@casey Bikes registered with an absent serial"));
    }
}
