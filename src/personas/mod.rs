//! Persona and goal catalog used to condition generated conversations.
//!
//! Sixteen user personas (MBTI types), ten coach personas, and a goal list
//! spanning health, career, finance, hobbies, growth, relationships,
//! lifestyle, and abstract challenges. Each record draws one of each
//! uniformly at random.

use rand::seq::IndexedRandom;

/// A behavioral archetype used in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Persona {
    /// Short identifier, e.g. `INTJ` or `Strict PT`.
    pub kind: &'static str,
    /// Free-text description of how the persona behaves.
    pub traits: &'static str,
}

impl Persona {
    const fn new(kind: &'static str, traits: &'static str) -> Self {
        Self { kind, traits }
    }
}

/// User-side personas.
pub const USER_PERSONAS: &[Persona] = &[
    // Analysts (NT)
    Persona::new("INTJ", "Strategic, logical, private, independent. Value competence and structure."),
    Persona::new("INTP", "Innovative, curious, logical, reserved. Love abstract concepts, hate redundancy."),
    Persona::new("ENTJ", "Bold, imaginative, strong-willed leaders. Efficient and organized."),
    Persona::new("ENTP", "Smart, curious thinkers who cannot resist an intellectual challenge."),
    // Diplomats (NF)
    Persona::new("INFJ", "Quiet and mystical, yet very inspiring and tireless idealists."),
    Persona::new("INFP", "Poetic, kind and altruistic people, always eager to help a good cause."),
    Persona::new("ENFJ", "Charismatic and inspiring leaders, able to mesmerize their listeners."),
    Persona::new("ENFP", "Enthusiastic, creative and sociable free spirits, who can always find a reason to smile."),
    // Sentinels (SJ)
    Persona::new("ISTJ", "Practical and fact-minded individuals, whose reliability cannot be doubted."),
    Persona::new("ISFJ", "Very dedicated and warm protectors, always ready to defend their loved ones."),
    Persona::new("ESTJ", "Excellent administrators, unsurpassed at managing things - or people."),
    Persona::new("ESFJ", "Extraordinarily caring, social and popular people, always eager to help."),
    // Explorers (SP)
    Persona::new("ISTP", "Bold and practical experimenters, masters of all kinds of tools."),
    Persona::new("ISFP", "Flexible and charming artists, always ready to explore and experience something new."),
    Persona::new("ESTP", "Smart, energetic and very perceptive people, who truly enjoy living on the edge."),
    Persona::new("ESFP", "Spontaneous, energetic and enthusiastic people - life is never boring around them."),
];

/// Coach-side personas.
pub const COACH_PERSONAS: &[Persona] = &[
    Persona::new("Strict PT", "No excuses, results-oriented, direct, tough love. Use short sentences. Push for action."),
    Persona::new("Warm Therapist", "Empathetic, validating, gentle, focuses on feelings and mental state. Asks \"How does that make you feel?\"."),
    Persona::new("Strategic Coach", "Analytical, data-driven, focuses on KPIs and bottlenecks. Asks \"What is the root cause?\"."),
    Persona::new("Motivational Speaker", "High energy, inspiring, uses metaphors and uplifting language. \"You can do this!\""),
    Persona::new("Reality Check Manager", "Balanced, pragmatic, points out feasibility issues politely but firmly. \"Is that realistic?\""),
    Persona::new("Socratic Questioner", "Answers with questions. Deeply philosophical. Forces the user to find their own answers."),
    Persona::new("Stoic Philosopher", "Focuses on what can be controlled. Calm, rational, unemotional. \"Accept what you cannot change.\""),
    Persona::new("Mindfulness Guru", "Focuses on the present moment, breathing, and awareness. \"Be here now.\""),
    Persona::new("Tiger Mom/Dad", "Extremely high expectations. Compares to others. \"Why not A+?\""),
    Persona::new("Chill Buddy", "Casual, slang-heavy, relaxed. \"No worries, bro. Just do what you can.\""),
];

/// Goals a user might be stuck on.
pub const GOALS: &[&str] = &[
    // Health & Fitness
    "Lose 10kg in 3 months", "Run a full marathon", "Build muscle mass", "Quit smoking",
    "Drink 2L of water daily", "Eat more vegetables", "Cut out sugar", "Start yoga", "Fix posture",
    "Sleep 8 hours a night", "Do 100 pushups daily", "Learn to swim", "Reduce alcohol consumption",
    "Start a vegan diet", "Meditate daily",
    // Career & Business
    "Launch a startup", "Get promoted to manager", "Find a remote job", "Learn Python programming",
    "Start a YouTube channel", "Write a business plan", "Network efficiently",
    "Improve public speaking", "Earn a professional certification", "Negotiate a higher salary",
    "Start a side hustle", "Become a freelancer", "Optimize LinkedIn profile",
    "Learn digital marketing", "Create an online course",
    // Finance
    "Save $10,000", "Pay off credit card debt", "Start investing in stocks", "Buy a house",
    "Create a monthly budget", "Build an emergency fund", "Open a retirement account",
    "Track daily expenses", "Improve credit score", "Learn about crypto",
    // Creativity & Hobbies
    "Write a novel", "Learn to play guitar", "Paint a portrait", "Start a blog", "Learn photography",
    "Cook a new recipe weekly", "Learn to dance salsa", "Start a podcast", "Learn calligraphy",
    "Design a font", "Write a screenplay", "Learn magic tricks", "Start gardening",
    "Knitting a scarf", "Learn pottery",
    // Personal Growth & Learning
    "Read 50 books a year", "Learn Spanish", "Wake up at 5AM", "Reduce screen time",
    "Keep a daily journal", "Practice gratitude", "Learn speed reading", "Improve memory",
    "Learn chess", "Solve a Rubik's cube", "Master Excel", "Learn history of Rome",
    "Understand quantum physics basics", "Learn sign language", "Improve emotional intelligence",
    // Relationships & Social
    "Make 5 new friends", "Call parents weekly", "Go on more dates", "Host a dinner party",
    "Volunteer at a shelter", "Improve listening skills", "Resolve conflict with a friend",
    "Plan a family trip", "Write handwritten letters", "Join a social club",
    // Lifestyle & Environment
    "Declutter the house", "Adopt a minimalist lifestyle", "Move to a new city",
    "Renovate the kitchen", "Start composting", "Reduce plastic waste", "Organize digital files",
    "Plan a world tour", "Buy a car", "Create a capsule wardrobe",
    // Challenging / Abstract
    "Find life purpose", "Overcome fear of failure", "Stop procrastinating",
    "Build self-confidence", "Learn to say no", "Forgive an enemy", "Conquer fear of heights",
    "Live without internet for a week", "Write a will", "Understand philosophy",
];

/// One drawn (user, coach, goal) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub user: Persona,
    pub coach: Persona,
    pub goal: &'static str,
}

/// Read-only persona and goal sets.
#[derive(Debug, Clone, Copy)]
pub struct PersonaCatalog {
    users: &'static [Persona],
    coaches: &'static [Persona],
    goals: &'static [&'static str],
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PersonaCatalog {
    /// The built-in catalog.
    pub const fn builtin() -> Self {
        Self {
            users: USER_PERSONAS,
            coaches: COACH_PERSONAS,
            goals: GOALS,
        }
    }

    /// A catalog over custom sets. `None` if any set is empty.
    pub fn new(
        users: &'static [Persona],
        coaches: &'static [Persona],
        goals: &'static [&'static str],
    ) -> Option<Self> {
        if users.is_empty() || coaches.is_empty() || goals.is_empty() {
            return None;
        }
        Some(Self {
            users,
            coaches,
            goals,
        })
    }

    /// User personas.
    pub fn users(&self) -> &'static [Persona] {
        self.users
    }

    /// Coach personas.
    pub fn coaches(&self) -> &'static [Persona] {
        self.coaches
    }

    /// Goals.
    pub fn goals(&self) -> &'static [&'static str] {
        self.goals
    }

    /// Draw one persona pair and goal uniformly at random.
    pub fn draw(&self) -> Assignment {
        let mut rng = rand::rng();
        // Every constructor rejects empty sets.
        Assignment {
            user: *self.users.choose(&mut rng).unwrap_or(&USER_PERSONAS[0]),
            coach: *self.coaches.choose(&mut rng).unwrap_or(&COACH_PERSONAS[0]),
            goal: self.goals.choose(&mut rng).copied().unwrap_or(GOALS[0]),
        }
    }
}
