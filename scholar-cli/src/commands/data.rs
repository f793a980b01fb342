//! `acm data`: usage data recorded by `acm chat`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use scholar_core::data::{DataStats, DataStorage, Feedback};

#[derive(Parser, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Summary of QA pairs, summaries and reading sessions
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export everything as training / analysis files
    Export {
        /// Output directory
        #[arg(long, short, default_value = "./exports")]
        output: PathBuf,
    },
    /// Mark an answer as helpful or not (unhelpful pairs are left out of exports)
    Feedback {
        /// QA pair id
        qa_id: String,

        #[arg(value_enum)]
        rating: Rating,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Rating {
    Helpful,
    Unhelpful,
}

impl From<Rating> for Feedback {
    fn from(rating: Rating) -> Self {
        match rating {
            Rating::Helpful => Feedback::Helpful,
            Rating::Unhelpful => Feedback::Unhelpful,
        }
    }
}

pub fn run_data(args: DataArgs) -> Result<()> {
    let storage = DataStorage::open_default();
    match args.command {
        DataCommands::Stats { json } => {
            let stats = storage.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", format_stats(&stats));
            }
        }
        DataCommands::Export { output } => {
            let written = storage.export(&output)?;
            println!("✓ Exported to {}", output.display());
            for (name, path) in written {
                println!("  {:<18} {}", name, path.display());
            }
        }
        DataCommands::Feedback { qa_id, rating } => {
            storage.record_feedback(&qa_id, rating.into())?;
            println!("✓ Feedback recorded for {}", qa_id);
        }
    }
    Ok(())
}

fn format_stats(stats: &DataStats) -> String {
    let qa = &stats.qa_corpus;
    let kb = &stats.knowledge_base;
    let sessions = &stats.reading_sessions;
    let models = if kb.models_used.is_empty() {
        "-".to_string()
    } else {
        kb.models_used.join(", ")
    };

    let mut out = String::new();
    out.push_str("QA corpus\n");
    out.push_str(&format!("  QA pairs:            {}\n", qa.total_qa_pairs));
    out.push_str(&format!("  With feedback:       {}\n", qa.pairs_with_feedback));
    out.push_str(&format!("  Papers asked about:  {}\n", qa.unique_papers));
    out.push_str("\nKnowledge base\n");
    out.push_str(&format!("  Papers summarised:   {}\n", kb.total_papers));
    out.push_str(&format!("  Models used:         {}\n", models));
    out.push_str("\nReading sessions\n");
    out.push_str(&format!("  Sessions:            {}\n", sessions.total_sessions));
    out.push_str(&format!("  Questions:           {}\n", sessions.total_questions));
    out.push_str(&format!(
        "  Reading time:        {:.1} h\n",
        sessions.total_reading_time_hours
    ));
    out.push_str(&format!("\nTotal data points: {}\n", stats.total_data_points));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats_from_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DataStorage::open(dir.path());
        storage
            .save_qa_pair("W1", "What is Paxos?", "A consensus protocol.", "gemini-1.5-pro")
            .unwrap();
        storage
            .save_knowledge("W1", "gemini-1.5-pro", "Paxos reaches agreement.")
            .unwrap();

        let text = format_stats(&storage.stats().unwrap());
        assert!(text.contains("QA pairs:            1"));
        assert!(text.contains("Models used:         gemini-1.5-pro"));
        assert!(text.contains("Reading time:        0.0 h"));
    }
}
