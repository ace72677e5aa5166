//! Hand-written handlers for platforms whose flows don't fit the rule
//! language: url inspection, per-item accordions, text-matched buttons and
//! state carried between detection and opt-out.

use std::rc::Rc;
use std::time::Duration;

use consent_engine::CmpHandler;

mod airbnb;
mod consentmanager;
mod conversant;
mod cookiebot;
mod evidon;
mod klaro;
mod onetrust;
mod sourcepoint;
mod trustarc;
mod uniconsent;

pub use airbnb::Airbnb;
pub use consentmanager::ConsentManager;
pub use conversant::Conversant;
pub use cookiebot::Cookiebot;
pub use evidon::Evidon;
pub use klaro::Klaro;
pub use onetrust::Onetrust;
pub use sourcepoint::Sourcepoint;
pub use trustarc::{TrustArcFrame, TrustArcTop};
pub use uniconsent::Uniconsent;

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Every built-in handler, in registration order.
pub fn builtin_handlers() -> Vec<Rc<dyn CmpHandler>> {
    vec![
        Rc::new(TrustArcTop::default()),
        Rc::new(TrustArcFrame),
        Rc::new(Cookiebot),
        Rc::new(Sourcepoint::default()),
        Rc::new(ConsentManager::default()),
        Rc::new(Evidon),
        Rc::new(Onetrust),
        Rc::new(Klaro::default()),
        Rc::new(Uniconsent),
        Rc::new(Conversant),
        Rc::new(Airbnb),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_names_are_unique() {
        let handlers = builtin_handlers();
        let names: HashSet<&str> = handlers.iter().map(|h| h.name()).collect();
        assert_eq!(names.len(), handlers.len());
        assert!(names.contains("TrustArc-top"));
        assert!(names.contains("Sourcepoint-frame"));
    }

    #[test]
    fn builtin_url_patterns_compile() {
        for handler in builtin_handlers() {
            handler.run_context().validate(handler.name()).unwrap();
        }
    }
}
