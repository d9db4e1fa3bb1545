//! Output formatting for mrmctl

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain `key: value` lines
    Text,
}

impl OutputFormat {
    pub fn is_structured(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

/// Types that can be rendered as a table row or a detail view
pub trait Formattable {
    fn table_headers() -> Vec<String>;
    fn table_row(&self) -> Vec<String>;

    /// Pairs for the single-item detail view
    fn key_value_pairs(&self) -> Vec<(String, String)>;
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print one item as a detail view or a structured document
    pub fn print_item<T>(&self, item: &T) -> Result<()>
    where
        T: Serialize + Formattable,
    {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => self.print_document(item)?,
            OutputFormat::Table => {
                for (key, value) in item.key_value_pairs() {
                    println!("{}: {}", key.bold().cyan(), value);
                }
            }
            OutputFormat::Text => {
                for (key, value) in item.key_value_pairs() {
                    println!("{}: {}", key, value);
                }
            }
        }
        Ok(())
    }

    pub fn print_list<T>(&self, items: &[T]) -> Result<()>
    where
        T: Serialize + Formattable,
    {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => return self.print_document(&items),
            _ if items.is_empty() => {
                println!("{}", "Nothing to show".dimmed());
            }
            OutputFormat::Table => self.print_table(items),
            OutputFormat::Text => {
                let headers = T::table_headers();
                for item in items {
                    let line: Vec<String> = headers
                        .iter()
                        .zip(item.table_row())
                        .map(|(h, v)| format!("{}={}", h.to_lowercase().replace(' ', "_"), v))
                        .collect();
                    println!("{}", line.join(" "));
                }
            }
        }
        Ok(())
    }

    /// Serialize any value in the structured formats
    ///
    /// Table and text output fall back to pretty JSON.
    pub fn print_document<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        match self.format {
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
            _ => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }

    fn print_table<T: Formattable>(&self, items: &[T]) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(
            T::table_headers()
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan)),
        );
        for item in items {
            table.add_row(item.table_row());
        }

        println!("{}", table);
    }

    /// Section heading between tables; suppressed for structured output
    pub fn print_heading(&self, title: &str) {
        match self.format {
            OutputFormat::Table => println!("\n{}", title.bold()),
            OutputFormat::Text => println!("\n# {}", title),
            _ => {}
        }
    }

    pub fn print_success(&self, message: &str) -> Result<()> {
        self.print_status("success", message)
    }

    pub fn print_warning(&self, message: &str) -> Result<()> {
        self.print_status("warning", message)
    }

    fn print_status(&self, status: &str, message: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => {
                self.print_document(&serde_json::json!({
                    "status": status,
                    "message": message,
                }))?;
            }
            OutputFormat::Table => match status {
                "success" => println!("{} {}", "✓".green().bold(), message.green()),
                _ => eprintln!("{} {}", "⚠".yellow().bold(), message.yellow()),
            },
            OutputFormat::Text => match status {
                "success" => println!("{}: {}", status, message),
                _ => eprintln!("{}: {}", status, message),
            },
        }
        Ok(())
    }
}

/// Render gigabytes the same way everywhere
pub fn gb(value: f64) -> String {
    format!("{:.2} GB", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: String,
        size: f64,
    }

    impl Formattable for Row {
        fn table_headers() -> Vec<String> {
            vec!["Name".to_string(), "Size".to_string()]
        }

        fn table_row(&self) -> Vec<String> {
            vec![self.name.clone(), gb(self.size)]
        }

        fn key_value_pairs(&self) -> Vec<(String, String)> {
            vec![
                ("Name".to_string(), self.name.clone()),
                ("Size".to_string(), gb(self.size)),
            ]
        }
    }

    #[test]
    fn test_default_format() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
        assert!(OutputFormat::Json.is_structured());
        assert!(!OutputFormat::Text.is_structured());
    }

    #[test]
    fn test_formattable_row() {
        let row = Row {
            name: "sd-model".to_string(),
            size: 8.0,
        };
        assert_eq!(Row::table_headers().len(), row.table_row().len());
        assert_eq!(row.table_row(), vec!["sd-model", "8.00 GB"]);
        assert_eq!(row.key_value_pairs()[1].1, "8.00 GB");
    }

    #[test]
    fn test_every_format_prints() {
        let rows = vec![Row {
            name: "llm-7b".to_string(),
            size: 10.0,
        }];
        for format in [
            OutputFormat::Table,
            OutputFormat::Json,
            OutputFormat::Yaml,
            OutputFormat::Text,
        ] {
            let formatter = OutputFormatter::new(format);
            formatter.print_list(&rows).unwrap();
            formatter.print_list::<Row>(&[]).unwrap();
            formatter.print_item(&rows[0]).unwrap();
            formatter.print_success("done").unwrap();
            formatter.print_warning("1 step did not match").unwrap();
        }
    }
}
