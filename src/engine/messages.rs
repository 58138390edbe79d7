//! Message catalog and structured-choice grammar.
//!
//! Every outbound text is looked up by (message id × language); every
//! non-free-text slot has a fixed choice set matched by id or by label.
//! Adding a language touches only this file and the follow-up stage
//! templates.

use crate::engine::state::Slot;
use crate::model::Language;

/// Identifier of a templated funnel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Welcome,
    AskGoal,
    AskName,
    AskBudget,
    AskPropertyKind,
    AskTransaction,
    ValueProp,
    AskContact,
    CannotProceed,
    AskSchedule,
    Closing,
    ClosingNurture,
    DoneAck,
    Fallback,
}

/// Look up the text of a message in a given language.
pub fn text(id: MessageId, lang: Language) -> &'static str {
    use Language::*;
    use MessageId::*;
    match (id, lang) {
        (Welcome, En) => "Welcome! Which language would you like to continue in?",
        (Welcome, Ar) => "أهلاً بك! بأي لغة تود المتابعة؟",
        (Welcome, Fr) => "Bienvenue ! Dans quelle langue souhaitez-vous continuer ?",

        (AskGoal, En) => "Great. Are you looking to invest, or for a home to live in?",
        (AskGoal, Ar) => "رائع. هل تبحث عن استثمار أم عن منزل للسكن؟",
        (AskGoal, Fr) => "Parfait. Cherchez-vous un investissement ou un logement ?",

        (AskName, En) => "May I have your name?",
        (AskName, Ar) => "ما اسمك الكريم؟",
        (AskName, Fr) => "Puis-je avoir votre nom ?",

        (AskBudget, En) => "What budget range are you working with?",
        (AskBudget, Ar) => "ما هي ميزانيتك التقريبية؟",
        (AskBudget, Fr) => "Quelle est votre fourchette de budget ?",

        (AskPropertyKind, En) => "What type of property are you interested in?",
        (AskPropertyKind, Ar) => "ما نوع العقار الذي يهمك؟",
        (AskPropertyKind, Fr) => "Quel type de bien vous intéresse ?",

        (AskTransaction, En) => "Are you looking to buy or to rent?",
        (AskTransaction, Ar) => "هل ترغب في الشراء أم الإيجار؟",
        (AskTransaction, Fr) => "Souhaitez-vous acheter ou louer ?",

        (ValueProp, En) => {
            "Based on what you've told me, we have a curated shortlist of \
             properties that fit your criteria, with current market pricing. \
             Would you like to see it?"
        }
        (ValueProp, Ar) => {
            "بناءً على ما أخبرتني به، لدينا قائمة مختارة من العقارات التي \
             تناسب معاييرك بأسعار السوق الحالية. هل تود الاطلاع عليها؟"
        }
        (ValueProp, Fr) => {
            "D'après vos critères, nous avons une sélection de biens qui \
             correspondent à votre recherche, aux prix actuels du marché. \
             Voulez-vous la voir ?"
        }

        (AskContact, En) => {
            "To send you the shortlist, I just need a phone number to reach you on."
        }
        (AskContact, Ar) => "لإرسال القائمة إليك، أحتاج فقط إلى رقم هاتف للتواصل معك.",
        (AskContact, Fr) => {
            "Pour vous envoyer la sélection, il me faut un numéro de téléphone."
        }

        (CannotProceed, En) => {
            "I have no way to reach you on this channel, so I can't take this \
             further here. Please contact our office directly and we'll pick \
             it up from there."
        }
        (CannotProceed, Ar) => {
            "لا توجد وسيلة للتواصل معك عبر هذه القناة، لذا لا يمكنني المتابعة \
             هنا. يرجى التواصل مع مكتبنا مباشرة وسنكمل من هناك."
        }
        (CannotProceed, Fr) => {
            "Je n'ai aucun moyen de vous joindre sur ce canal, je ne peux donc \
             pas continuer ici. Contactez notre agence directement et nous \
             reprendrons à partir de là."
        }

        (AskSchedule, En) => "Perfect. How would you like to proceed?",
        (AskSchedule, Ar) => "ممتاز. كيف تود المتابعة؟",
        (AskSchedule, Fr) => "Parfait. Comment souhaitez-vous procéder ?",

        (Closing, En) => {
            "Thank you! One of our consultants will be in touch shortly with \
             your shortlist."
        }
        (Closing, Ar) => "شكراً لك! سيتواصل معك أحد مستشارينا قريباً مع قائمتك المختارة.",
        (Closing, Fr) => {
            "Merci ! Un de nos conseillers vous contactera sous peu avec votre \
             sélection."
        }

        (ClosingNurture, En) => {
            "No problem at all. I'll keep your criteria on file and reach out \
             when something worth your time comes up."
        }
        (ClosingNurture, Ar) => {
            "لا مشكلة إطلاقاً. سأحتفظ بمعاييرك وسأتواصل معك عندما يتوفر ما \
             يستحق وقتك."
        }
        (ClosingNurture, Fr) => {
            "Aucun problème. Je garde vos critères et je reviendrai vers vous \
             dès qu'une opportunité intéressante se présente."
        }

        (DoneAck, En) => "Thanks — your consultant has everything and will follow up with you.",
        (DoneAck, Ar) => "شكراً — لدى مستشارك كل المعلومات وسيتابع معك.",
        (DoneAck, Fr) => "Merci — votre conseiller a tout ce qu'il faut et reviendra vers vous.",

        (Fallback, En) => "Good question — let me check that with the team and get back to you.",
        (Fallback, Ar) => "سؤال وجيه — سأتحقق من ذلك مع الفريق وأعود إليك.",
        (Fallback, Fr) => "Bonne question — je vérifie avec l'équipe et je reviens vers vous.",
    }
}

/// One selectable option for a slot.
#[derive(Debug)]
pub struct Choice {
    /// Stable id, carried in button/list payloads.
    pub id: &'static str,
    /// Labels indexed en/ar/fr.
    labels: [&'static str; 3],
    /// Lowercase free-text aliases accepted as this choice.
    synonyms: &'static [&'static str],
}

impl Choice {
    pub fn label(&self, lang: Language) -> &'static str {
        match lang {
            Language::En => self.labels[0],
            Language::Ar => self.labels[1],
            Language::Fr => self.labels[2],
        }
    }
}

static LANGUAGE_CHOICES: &[Choice] = &[
    Choice {
        id: "lang_en",
        labels: ["English", "English", "English"],
        synonyms: &["english", "en"],
    },
    Choice {
        id: "lang_ar",
        labels: ["العربية", "العربية", "العربية"],
        synonyms: &["arabic", "عربي", "ar"],
    },
    Choice {
        id: "lang_fr",
        labels: ["Français", "Français", "Français"],
        synonyms: &["french", "francais", "fr"],
    },
];

static GOAL_CHOICES: &[Choice] = &[
    Choice {
        id: "goal_invest",
        labels: ["To invest", "للاستثمار", "Investir"],
        synonyms: &["invest", "investment", "استثمار", "investir"],
    },
    Choice {
        id: "goal_live",
        labels: ["A home to live in", "منزل للسكن", "Pour y vivre"],
        synonyms: &["live", "home", "residence", "سكن", "vivre"],
    },
];

static BUDGET_CHOICES: &[Choice] = &[
    Choice {
        id: "budget_under_1m",
        labels: ["Under 1M", "أقل من مليون", "Moins de 1M"],
        synonyms: &["under 1m", "<1m"],
    },
    Choice {
        id: "budget_1m_2_5m",
        labels: ["1M – 2.5M", "مليون إلى ٢٫٥ مليون", "1M – 2,5M"],
        synonyms: &["1-2.5m", "1m-2.5m"],
    },
    Choice {
        id: "budget_2_5m_5m",
        labels: ["2.5M – 5M", "٢٫٥ إلى ٥ ملايين", "2,5M – 5M"],
        synonyms: &["2.5-5m", "2.5m-5m"],
    },
    Choice {
        id: "budget_over_5m",
        labels: ["Over 5M", "أكثر من ٥ ملايين", "Plus de 5M"],
        synonyms: &["over 5m", ">5m"],
    },
];

static PROPERTY_KIND_CHOICES: &[Choice] = &[
    Choice {
        id: "pt_apartment",
        labels: ["Apartment", "شقة", "Appartement"],
        synonyms: &["apartment", "flat", "شقة", "appartement"],
    },
    Choice {
        id: "pt_villa",
        labels: ["Villa", "فيلا", "Villa"],
        synonyms: &["villa", "فيلا"],
    },
    Choice {
        id: "pt_townhouse",
        labels: ["Townhouse", "تاون هاوس", "Maison de ville"],
        synonyms: &["townhouse", "تاون هاوس"],
    },
    Choice {
        id: "pt_office",
        labels: ["Office", "مكتب", "Bureau"],
        synonyms: &["office", "مكتب", "bureau"],
    },
    Choice {
        id: "pt_land",
        labels: ["Land", "أرض", "Terrain"],
        synonyms: &["land", "plot", "أرض", "terrain"],
    },
];

static TRANSACTION_CHOICES: &[Choice] = &[
    Choice {
        id: "tx_buy",
        labels: ["Buy", "شراء", "Acheter"],
        synonyms: &["buy", "purchase", "شراء", "acheter"],
    },
    Choice {
        id: "tx_rent",
        labels: ["Rent", "إيجار", "Louer"],
        synonyms: &["rent", "إيجار", "louer"],
    },
];

static INTEREST_CHOICES: &[Choice] = &[
    Choice {
        id: "interest_yes",
        labels: ["Yes, show me", "نعم، أرني", "Oui, montrez-moi"],
        synonyms: &["yes", "sure", "ok", "نعم", "oui"],
    },
    Choice {
        id: "interest_no",
        labels: ["Not right now", "ليس الآن", "Pas maintenant"],
        synonyms: &["no", "later", "not now", "لا", "non"],
    },
];

static SCHEDULE_CHOICES: &[Choice] = &[
    Choice {
        id: "sched_call",
        labels: ["Schedule a call", "حدد مكالمة", "Planifier un appel"],
        synonyms: &["call", "مكالمة", "appel"],
    },
    Choice {
        id: "sched_visit",
        labels: ["Book a viewing", "احجز معاينة", "Réserver une visite"],
        synonyms: &["visit", "viewing", "معاينة", "visite"],
    },
    Choice {
        id: "sched_later",
        labels: ["Just send the list", "أرسل القائمة فقط", "Envoyez la liste"],
        synonyms: &["send", "list", "القائمة", "liste"],
    },
];

/// The structured choice set for a slot. Free-text slots (name, contact)
/// have no choices.
pub fn choices_for(slot: Slot) -> &'static [Choice] {
    match slot {
        Slot::Language => LANGUAGE_CHOICES,
        Slot::Goal => GOAL_CHOICES,
        Slot::Budget => BUDGET_CHOICES,
        Slot::PropertyKind => PROPERTY_KIND_CHOICES,
        Slot::Transaction => TRANSACTION_CHOICES,
        Slot::Interest => INTEREST_CHOICES,
        Slot::Schedule => SCHEDULE_CHOICES,
        Slot::Name | Slot::Contact => &[],
    }
}

/// Match an input against a slot's choice set.
///
/// A structured choice id wins outright; otherwise the trimmed free text must
/// equal a label or a synonym, case-insensitively. Anything else is an
/// interrupt, not a mismatch error.
pub fn match_choice(
    slot: Slot,
    structured_choice_id: Option<&str>,
    free_text: Option<&str>,
) -> Option<&'static Choice> {
    let choices = choices_for(slot);
    if let Some(id) = structured_choice_id {
        return choices.iter().find(|c| c.id == id);
    }
    let text = free_text?.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    choices.iter().find(|c| {
        c.labels.iter().any(|l| l.to_lowercase() == text)
            || c.synonyms.iter().any(|s| *s == text)
    })
}
