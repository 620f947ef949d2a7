use crate::models::Scenario;

pub static SCENARIOS: [Scenario; 6] = [
    Scenario {
        id: "spiritual_care",
        title: "Spiritual Care",
        description: "Holistic health and spiritual well-being",
        icon: "heart",
    },
    Scenario {
        id: "biblical_counseling",
        title: "Biblical Counseling",
        description: "Guidance rooted in Scripture",
        icon: "book-open",
    },
    Scenario {
        id: "crisis_intervention",
        title: "Crisis Intervention",
        description: "Grief, illness, and spiritual distress",
        icon: "shield",
    },
    Scenario {
        id: "family_conflict",
        title: "Family Conflict",
        description: "Conflict mediation and family systems",
        icon: "users",
    },
    Scenario {
        id: "health_ministry",
        title: "Health Ministry",
        description: "Health evangelism and addiction recovery",
        icon: "hospital",
    },
    Scenario {
        id: "ethical_dilemmas",
        title: "Ethical Dilemmas",
        description: "Applying SDA Church Manual and biblical ethics",
        icon: "cross",
    },
];

pub fn all() -> &'static [Scenario] {
    &SCENARIOS
}

pub fn find(id: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.id == id)
}
