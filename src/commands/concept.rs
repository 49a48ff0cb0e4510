//! Concept commands.

use super::{concept_service, parse_domain};
use anyhow::Context;
use clap::Subcommand;
use mnemo::MnemoConfig;
use mnemo::models::{Concept, ConceptRequest, ConceptType, KnowledgeQuery, parse_validation};

/// Concept subcommands.
#[derive(Subcommand)]
pub enum ConceptAction {
    /// Create or update a concept.
    Store {
        /// Concept name.
        #[arg(short, long)]
        name: String,

        /// Concept type: entity, abstract, action, property, event, pending.
        #[arg(short = 't', long = "type", default_value = "entity")]
        concept_type: String,

        /// Description.
        #[arg(short, long)]
        description: String,

        /// Related concept names (comma-separated).
        #[arg(short, long, value_delimiter = ',')]
        related: Vec<String>,

        /// Validation metadata as a JSON object.
        #[arg(long)]
        validation: Option<String>,

        /// Mark as consolidation output (applies the confidence floor).
        #[arg(long)]
        consolidation: bool,
    },

    /// Show a concept with its relationships.
    Get {
        /// Concept name.
        name: String,
    },

    /// Case-insensitive search over names and descriptions.
    Search {
        /// Substring to look for.
        query: String,
    },

    /// Structured query over concepts and their validation metadata.
    Query {
        /// Exact names (comma-separated).
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// Substring of the description.
        #[arg(long)]
        description: Option<String>,

        /// Concept type.
        #[arg(short = 't', long = "type")]
        concept_type: Option<String>,

        /// Validation domain.
        #[arg(long)]
        domain: Option<String>,

        /// Validation access domain.
        #[arg(long)]
        access_domain: Option<String>,

        /// Cross-domain grant approval state.
        #[arg(long)]
        approved: Option<bool>,

        /// Cross-domain grant request state.
        #[arg(long)]
        requested: Option<bool>,

        /// Cross-domain grant source domain.
        #[arg(long)]
        source_domain: Option<String>,

        /// Cross-domain grant target domain.
        #[arg(long)]
        target_domain: Option<String>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Concept command.
pub fn cmd_concept(config: &MnemoConfig, action: ConceptAction) -> anyhow::Result<()> {
    let service = concept_service(config)?;

    match action {
        ConceptAction::Store {
            name,
            concept_type,
            description,
            related,
            validation,
            consolidation,
        } => {
            let mut request =
                ConceptRequest::new(name, concept_type, description).with_related(related);
            if let Some(raw) = validation {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).context("--validation is not valid JSON")?;
                request = request.with_validation(parse_validation(&value)?);
            }
            request.is_consolidation = consolidation;

            let concept = service.store_concept(&request)?;
            println!(
                "Stored {} ({}) with {} related, confidence {:.2}",
                concept.name,
                concept.concept_type.as_str(),
                concept.related.len(),
                concept.validation.confidence
            );
        },
        ConceptAction::Get { name } => {
            let concept = service
                .get_concept(&name)?
                .with_context(|| format!("concept '{name}' not found"))?;
            println!("{}", serde_json::to_string_pretty(&concept)?);
        },
        ConceptAction::Search { query } => {
            print_concepts(&service.search_concepts(&query)?);
        },
        ConceptAction::Query {
            names,
            description,
            concept_type,
            domain,
            access_domain,
            approved,
            requested,
            source_domain,
            target_domain,
            limit,
        } => {
            let mut filter = KnowledgeQuery::new();
            if !names.is_empty() {
                filter = filter.with_names(names);
            }
            if let Some(pattern) = description {
                filter = filter.with_description_pattern(pattern);
            }
            if let Some(t) = concept_type {
                let parsed = ConceptType::parse(&t)
                    .with_context(|| format!("unknown concept type '{t}'"))?;
                filter = filter.with_type(parsed);
            }
            if let Some(d) = domain {
                filter = filter.with_domain(parse_domain(&d)?);
            }
            if let Some(d) = access_domain {
                filter = filter.with_access_domain(parse_domain(&d)?);
            }
            if let Some(a) = approved {
                filter = filter.with_cross_domain_approved(a);
            }
            if let Some(r) = requested {
                filter = filter.with_cross_domain_requested(r);
            }
            if let Some(d) = source_domain {
                filter = filter.with_cross_domain_source(parse_domain(&d)?);
            }
            if let Some(d) = target_domain {
                filter = filter.with_cross_domain_target(parse_domain(&d)?);
            }
            if let Some(limit) = limit {
                filter = filter.with_limit(limit);
            }
            print_concepts(&service.query_knowledge(&filter)?);
        },
    }
    Ok(())
}

fn print_concepts(concepts: &[Concept]) {
    println!("Found {} concepts:", concepts.len());
    for concept in concepts {
        println!(
            "  [{:.2}] {} ({}) - {}",
            concept.validation.confidence,
            concept.name,
            concept.concept_type.as_str(),
            concept.description
        );
    }
}
