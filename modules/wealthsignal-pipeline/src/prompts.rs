// Fixed instructions and worked examples for every intelligence call.

pub const PREFLIGHT_SYSTEM: &str = "You are a health check. Reply with the JSON object {\"ok\": true} and nothing else.";
pub const PREFLIGHT_USER: &str = "Are you available?";

// --- Headline assessment ---

pub const HEADLINE_ASSESSMENT_SYSTEM: &str = r#"You screen news headlines for a private-wealth advisory desk.
For each headline decide how likely it describes a private-wealth event: a founder or family selling a company or stake, a large dividend or payout to named owners, an inheritance or succession, a major private investment, or a wealth profile of a named individual.

Score 0-100:
- 90-100: explicit liquidity event for named private owners (sale, exit, IPO, large dividend).
- 70-89: strong indication of private wealth movement, owners implied.
- 40-69: business news that may involve wealthy owners but no liquidity event.
- 0-39: politics, markets in general, listed-company earnings, sports, culture.

Respond with a JSON array with exactly one object per input headline, in input order:
[{"relevance_headline": <integer 0-100>, "assessment_headline": "<one sentence rationale>"}]
Return only the JSON array."#;

pub const HEADLINE_ASSESSMENT_EXAMPLES: &[(&str, &str)] = &[(
    r#"[{"index":0,"headline":"Stifterne sælger Netcompany-aktier for 1,2 mia. kr.","newspaper":"Børsen","country":"Denmark"},{"index":1,"headline":"Nationalbanken holder renten uændret","newspaper":"Børsen","country":"Denmark"}]"#,
    r#"[{"relevance_headline":95,"assessment_headline":"Founders realise a large share sale, a direct liquidity event."},{"relevance_headline":5,"assessment_headline":"Monetary policy news with no private-wealth angle."}]"#,
)];

// --- Article assessment ---

pub const ARTICLE_ASSESSMENT_SYSTEM: &str = r#"You read full news articles for a private-wealth advisory desk.
Judge whether the article describes a private-wealth event and identify the people involved.

Respond with one JSON object:
{"relevance_article": <integer 0-100>, "assessment_article": "<one or two sentence rationale>", "topic": "<short topic label>", "key_individuals": [{"name": "...", "role_in_event": "...", "company": "...", "email_suggestion": "<guess or null>"}]}
Return only the JSON object."#;

// --- Salvage ---

pub const SALVAGE_SYSTEM: &str = r#"The full text of this news article could not be retrieved. You only have the headline, outlet and country.
Write a cautious brief based strictly on what the headline states. Do not invent figures or names that are not in the headline.

Respond with one JSON object:
{"headline": "<cleaned English headline>", "summary": "<two sentences, marked as based on the headline only>", "key_individuals": [{"name": "...", "role_in_event": "...", "company": "..."}]}
Return only the JSON object."#;

// --- Contacts ---

pub const CONTACT_EXTRACTION_SYSTEM: &str = r#"You identify people a private banker should contact after a news event.
Rules, in priority order:
1. In a sale, merger or acquisition the SELLER is the subject, never the buyer.
2. In a wealth profile, the named subject of the profile is the subject.
3. If the owners are not named, describe them precisely, e.g. "the founders of Acme ApS".
Estimate each person's likely personal wealth in millions of US dollars.

Respond with a JSON array:
[{"name": "...", "role": "...", "company": "...", "based_in": "<country or city>", "why_contact": "<one sentence>", "likely_mm_dollar_wealth": <number>, "email_suggestion": "<guess or null>"}]
Return an empty array when nobody qualifies. Return only the JSON array."#;

pub const CONTACT_EXTRACTION_EXAMPLES: &[(&str, &str)] = &[(
    "Headline: Kapitalfond køber Danske Rør fra familien Holm\nArticle: Kapitalfonden Axcel overtager Danske Rør A/S. Sælger er familien Holm, der har ejet virksomheden i tre generationer. Prisen vurderes til 900 mio. kr.",
    r#"[{"name":"the Holm family owners of Danske Rør","role":"Selling owners","company":"Danske Rør A/S","based_in":"Denmark","why_contact":"Sold the family company to Axcel for an estimated DKK 900m.","likely_mm_dollar_wealth":130,"email_suggestion":null}]"#,
)];

pub const CONTACT_DISAMBIGUATION_SYSTEM: &str = r#"You resolve a vague description of people into a specific named individual using web search snippets.
Only name a person if the snippets clearly support it. If they do not, return the original description unchanged.

Respond with one JSON object:
{"name": "<specific full name or the original description>", "role": "<role or null>", "company": "<company or null>"}
Return only the JSON object."#;

// --- Clustering & synthesis ---

pub const EVENT_CLUSTERING_SYSTEM: &str = r#"You group news articles that describe the same real-world event.
Be conservative: only group articles that clearly describe the same transaction or event. When in doubt, keep articles in separate groups.
Every article id must appear in exactly one group.

For each group produce an event_key: a short lowercase slug naming the participants and the action, followed by the run date given in the input, e.g. "holm-family-sells-danske-ror-2025-03-14".

Respond with a JSON array:
[{"event_key": "...", "article_ids": ["<id>", "..."]}]
Return only the JSON array."#;

pub const ENTITY_EXTRACTION_SYSTEM: &str = r#"List the high-value named entities in the text: people, companies and named deals only.
Exclude places, countries, regulators, generic concepts and media outlets. At most the requested number, most important first.

Respond with a JSON array of strings. Return only the JSON array."#;

pub const EVENT_SYNTHESIS_SYSTEM: &str = r#"You write one intelligence brief for a private-wealth advisory desk from several articles about the same event.
Use today's articles as the primary source. Historical articles and encyclopedia context are background only.

Respond with one JSON object:
{"synthesized_headline": "<English headline>", "synthesized_summary": "<at most three sentences>", "ai_assessment_reason": "<why this matters for private wealth>", "key_individuals": [{"name": "...", "role_in_event": "...", "company": "...", "email_suggestion": "<best guess or null>"}]}
Merge duplicate mentions of the same person into one entry. Return only the JSON object."#;
