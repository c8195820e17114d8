//! Personalized thank-you message and event invitation.
//!
//! Everything is plain text with `{name}` substituted; the page owns markup.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::config::InvitationConfig;
use crate::types::{Submission, UserType};

const NAME_PLACEHOLDER: &str = "{name}";

const FALLBACK_WISH: &str = "Thank you, {name}, for celebrating with me!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventInvitation {
    pub title: String,
    pub host: String,
    pub time: String,
    pub venue: String,
    pub closing: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedInvitation {
    pub wish: String,
    pub event: EventInvitation,
    /// Entry instructions for the guest type
    pub guest_note: String,
}

#[derive(Debug, Clone)]
pub struct Invitation {
    wishes: Vec<String>,
    event_title: String,
    host: String,
    event_time: String,
    venue: String,
    closing: String,
}

fn personalize(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

impl Invitation {
    pub fn from_config(config: &InvitationConfig) -> Self {
        Self {
            wishes: config.wishes.clone(),
            event_title: config.event_title.clone(),
            host: config.host.clone(),
            event_time: config.event_time.clone(),
            venue: config.venue.clone(),
            closing: config.closing.clone(),
        }
    }

    /// One wish chosen uniformly at random, addressed to `name`.
    pub fn pick_wish<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> String {
        let template = self
            .wishes
            .choose(rng)
            .map_or(FALLBACK_WISH, String::as_str);
        personalize(template, name)
    }

    pub fn event(&self, name: &str) -> EventInvitation {
        EventInvitation {
            title: self.event_title.clone(),
            host: self.host.clone(),
            time: self.event_time.clone(),
            venue: self.venue.clone(),
            closing: personalize(&self.closing, name),
        }
    }

    /// Outsiders get their entry QR code by e-mail; students need none.
    pub fn guest_note(user_type: UserType, name: &str) -> String {
        match user_type {
            UserType::Outsider => format!(
                "The entry QR code will be sent to {name}'s personal e-mail. \
                 Please check your inbox, the QR code is required to enter the campus for the ceremony."
            ),
            UserType::Student => "Students of the university do not need a QR code.".to_string(),
        }
    }

    pub fn render<R: Rng + ?Sized>(&self, submission: &Submission, rng: &mut R) -> RenderedInvitation {
        let name = submission.name();
        RenderedInvitation {
            wish: self.pick_wish(name, rng),
            event: self.event(name),
            guest_note: Self::guest_note(submission.user_type(), name),
        }
    }
}

impl Default for Invitation {
    fn default() -> Self {
        Self::from_config(&InvitationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_every_wish_is_personalized() {
        let invitation = Invitation::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let wish = invitation.pick_wish("Lan", &mut rng);
            assert!(wish.contains("Lan"));
            assert!(!wish.contains(NAME_PLACEHOLDER));
        }
    }

    #[test]
    fn test_empty_wish_book_falls_back() {
        let mut config = InvitationConfig::default();
        config.wishes.clear();
        let invitation = Invitation::from_config(&config);
        let wish = invitation.pick_wish("Lan", &mut StdRng::seed_from_u64(1));
        assert_eq!(wish, "Thank you, Lan, for celebrating with me!");
    }

    #[test]
    fn test_guest_note_per_type() {
        let outsider = Invitation::guest_note(UserType::Outsider, "Lan");
        assert!(outsider.contains("QR code"));
        assert!(outsider.contains("Lan"));

        let student = Invitation::guest_note(UserType::Student, "Lan");
        assert!(student.contains("do not need a QR code"));
    }

    #[test]
    fn test_event_closing_names_guest() {
        let event = Invitation::default().event("Lan");
        assert_eq!(event.title, "GRADUATION CEREMONY");
        assert!(event.closing.starts_with("Your presence, Lan,"));
    }
}
