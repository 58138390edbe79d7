//! Staged follow-up copy.
//!
//! Each automated touch escalates through five stages keyed by the lead's
//! follow-up count; the sequence ends with a graceful exit rather than
//! repeating itself.

use crate::model::Language;

/// Machine-readable stage name, used in logs.
pub fn stage_label(count: u32) -> &'static str {
    match count {
        0 => "introduction",
        1 => "value_add",
        2 => "social_proof",
        3 => "urgency",
        _ => "graceful_exit",
    }
}

/// The message body for a lead on its `count`-th automated follow-up.
/// Counts past the last stage stay on the graceful exit.
pub fn stage_message(count: u32, language: Language) -> &'static str {
    use Language::*;
    match (count, language) {
        (0, En) => "Hi again! Just checking in — are you still looking for a property? I'm happy to pick up right where we left off.",
        (0, Ar) => "مرحباً مجدداً! أردت فقط الاطمئنان — هل ما زلت تبحث عن عقار؟ يسعدني أن نكمل من حيث توقفنا.",
        (0, Fr) => "Re-bonjour ! Je voulais savoir si vous cherchez toujours un bien ? Je peux reprendre là où nous nous étions arrêtés.",

        (1, En) => "A few new listings came in that could fit what you described. Want me to send a quick selection?",
        (1, Ar) => "وصلتنا عقارات جديدة قد تناسب ما وصفته. هل ترغب أن أرسل لك مجموعة مختارة؟",
        (1, Fr) => "Quelques nouveaux biens correspondant à votre recherche viennent d'arriver. Voulez-vous que je vous envoie une sélection ?",

        (2, En) => "Buyers with similar budgets closed great deals this month. If the timing works, I can line up viewings this week.",
        (2, Ar) => "عملاء بميزانيات مشابهة أتموا صفقات ممتازة هذا الشهر. إذا كان الوقت مناسباً، يمكنني ترتيب معاينات هذا الأسبوع.",
        (2, Fr) => "Des acheteurs avec un budget similaire ont conclu de belles affaires ce mois-ci. Si le moment vous convient, je peux organiser des visites cette semaine.",

        (3, En) => "Heads up — a couple of the options we discussed are getting offers. If you're still interested, now is a good moment to move.",
        (3, Ar) => "تنبيه — بعض الخيارات التي ناقشناها بدأت تتلقى عروضاً. إذا كنت لا تزال مهتماً، فهذا وقت مناسب للتحرك.",
        (3, Fr) => "Attention — certaines des options dont nous avons parlé reçoivent des offres. Si vous êtes toujours intéressé, c'est le bon moment.",

        (_, En) => "I'll stop checking in for now so I don't crowd your inbox. Whenever you're ready, just send a message and we'll continue.",
        (_, Ar) => "سأتوقف عن المتابعة حالياً حتى لا أزعجك. متى كنت جاهزاً، أرسل رسالة وسنكمل.",
        (_, Fr) => "Je cesse mes relances pour ne pas encombrer votre messagerie. Dès que vous êtes prêt, envoyez-moi un message et nous reprendrons.",
    }
}
