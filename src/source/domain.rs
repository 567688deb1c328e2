//! Domain classification of source databases.
//!
//! Keyword scoring over the database id, table names and column names. Each
//! domain accumulates points for every keyword hit; the highest score wins,
//! ties go to the domain listed first. A database with no hits is
//! [`GENERAL_DOMAIN`].

/// Label for databases that match no domain.
pub const GENERAL_DOMAIN: &str = "general";

const DB_ID_WEIGHT: u32 = 10;
const TABLE_PATTERN_WEIGHT: u32 = 5;
const TABLE_KEYWORD_WEIGHT: u32 = 3;
const COLUMN_KEYWORD_WEIGHT: u32 = 1;

/// Keyword rule for one domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainRule {
    pub name: &'static str,
    /// Matched against the database id, table names and column names.
    pub keywords: &'static [&'static str],
    /// Matched against table names only.
    pub table_patterns: &'static [&'static str],
}

/// All known domains in tie-break order.
pub const DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        name: "financial",
        keywords: &[
            "bank",
            "finance",
            "trading",
            "stock",
            "money",
            "credit",
            "loan",
            "payment",
            "investment",
        ],
        table_patterns: &["account", "transaction", "payment", "balance", "credit", "debit"],
    },
    DomainRule {
        name: "healthcare",
        keywords: &[
            "hospital",
            "medical",
            "patient",
            "health",
            "doctor",
            "clinic",
            "medicine",
            "treatment",
        ],
        table_patterns: &["patient", "doctor", "diagnosis", "treatment", "medical_record"],
    },
    DomainRule {
        name: "education",
        keywords: &[
            "school",
            "student",
            "university",
            "college",
            "academic",
            "course",
            "class",
            "grade",
        ],
        table_patterns: &["student", "course", "grade", "enrollment", "teacher", "class"],
    },
    DomainRule {
        name: "retail",
        keywords: &["store", "shop", "retail", "customer", "product", "sales", "order", "purchase"],
        table_patterns: &["customer", "order", "product", "inventory", "sale", "purchase"],
    },
    DomainRule {
        name: "sports",
        keywords: &["game", "sport", "team", "player", "match", "league", "tournament", "athlete"],
        table_patterns: &["player", "team", "game", "score", "match", "season"],
    },
    DomainRule {
        name: "technology",
        keywords: &["software", "tech", "computer", "system", "app", "web", "platform", "network"],
        table_patterns: &[],
    },
    DomainRule {
        name: "entertainment",
        keywords: &["movie", "film", "music", "artist", "show", "concert", "media", "theater"],
        table_patterns: &["movie", "actor", "artist", "album", "song", "show"],
    },
    DomainRule {
        name: "transportation",
        keywords: &[
            "car",
            "flight",
            "train",
            "transport",
            "airline",
            "vehicle",
            "shipping",
            "logistics",
        ],
        table_patterns: &["flight", "passenger", "route", "schedule", "vehicle"],
    },
    DomainRule {
        name: "government",
        keywords: &[
            "government",
            "public",
            "city",
            "county",
            "state",
            "federal",
            "municipal",
            "civic",
        ],
        table_patterns: &["citizen", "permit", "license", "department", "official"],
    },
    DomainRule {
        name: "real_estate",
        keywords: &["property", "house", "building", "real_estate", "apartment", "rent", "lease"],
        table_patterns: &["property", "listing", "agent", "buyer", "seller", "mortgage"],
    },
    DomainRule {
        name: "human_resources",
        keywords: &["employee", "hr", "payroll", "staff", "personnel", "workforce", "hiring"],
        table_patterns: &[],
    },
    DomainRule {
        name: "manufacturing",
        keywords: &["factory", "production", "manufacturing", "supply", "warehouse", "inventory"],
        table_patterns: &[],
    },
    DomainRule {
        name: "telecom",
        keywords: &["telecom", "phone", "mobile", "network", "communication", "cellular"],
        table_patterns: &[],
    },
    DomainRule {
        name: "insurance",
        keywords: &["insurance", "policy", "claim", "coverage", "premium", "risk"],
        table_patterns: &[],
    },
    DomainRule {
        name: "food_service",
        keywords: &["restaurant", "food", "menu", "dining", "cafe", "recipe", "nutrition"],
        table_patterns: &[],
    },
    DomainRule {
        name: "energy",
        keywords: &["energy", "power", "utility", "electric", "gas", "solar", "renewable"],
        table_patterns: &[],
    },
    DomainRule {
        name: "agriculture",
        keywords: &["farm", "agriculture", "crop", "livestock", "farming", "rural"],
        table_patterns: &[],
    },
    DomainRule {
        name: "legal",
        keywords: &["legal", "law", "court", "justice", "attorney", "police", "crime"],
        table_patterns: &[],
    },
    DomainRule {
        name: "nonprofit",
        keywords: &["nonprofit", "charity", "social", "volunteer", "donation", "community"],
        table_patterns: &[],
    },
    DomainRule {
        name: "tourism",
        keywords: &["travel", "tourism", "hotel", "vacation", "booking", "destination"],
        table_patterns: &[],
    },
    DomainRule {
        name: "research",
        keywords: &["research", "science", "laboratory", "experiment", "study", "academic"],
        table_patterns: &[],
    },
];

impl DomainRule {
    fn score<'a>(
        &self,
        db_id: &str,
        tables: impl IntoIterator<Item = &'a str>,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> u32 {
        let hits =
            |text: &str, words: &[&str]| words.iter().filter(|w| text.contains(*w)).count() as u32;

        let mut score = hits(db_id, self.keywords) * DB_ID_WEIGHT;
        for table in tables {
            let table = table.to_lowercase();
            score += hits(&table, self.table_patterns) * TABLE_PATTERN_WEIGHT;
            score += hits(&table, self.keywords) * TABLE_KEYWORD_WEIGHT;
        }
        for column in columns {
            score += hits(&column.to_lowercase(), self.keywords) * COLUMN_KEYWORD_WEIGHT;
        }
        score
    }
}

/// Classify a database from its id and, when known, its table and column
/// names.
pub fn classify(db_id: &str, tables: &[&str], columns: &[&str]) -> &'static str {
    let db_id = db_id.to_lowercase();
    let mut best: Option<(&'static str, u32)> = None;

    for rule in DOMAIN_RULES {
        let score = rule.score(&db_id, tables.iter().copied(), columns.iter().copied());
        if score > 0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((rule.name, score));
        }
    }

    best.map_or(GENERAL_DOMAIN, |(name, _)| name)
}
