use crate::cli::args::{ClassifyArgs, OutputFormat};
use crate::exit_codes::{worst, EXIT_LOAD_ERROR, EXIT_SUCCESS};
use amibag_core::AmiBag;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ClassifyOutput {
    bag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bag_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(args: ClassifyArgs) -> Result<i32> {
    let config = super::load(&args.config)?;
    let mut outputs = Vec::with_capacity(args.bags.len());
    let mut codes = Vec::with_capacity(args.bags.len());

    for path in &args.bags {
        let bag = path.display().to_string();
        match AmiBag::open(path, &config) {
            Ok(ami) => {
                codes.push(EXIT_SUCCESS);
                outputs.push(ClassifyOutput {
                    bag,
                    bag_type: Some(ami.bag_type().to_string()),
                    subtype: Some(ami.subtype().to_string()),
                    error: None,
                });
            }
            Err(e) => {
                codes.push(EXIT_LOAD_ERROR);
                outputs.push(ClassifyOutput {
                    bag,
                    bag_type: None,
                    subtype: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outputs)?),
        OutputFormat::Text => {
            for out in &outputs {
                match (&out.bag_type, &out.subtype, &out.error) {
                    (Some(t), Some(s), _) => println!("{}\t{} {}", out.bag, t, s),
                    (_, _, Some(e)) => eprintln!("{}\terror: {}", out.bag, e),
                    _ => {}
                }
            }
        }
    }

    Ok(worst(codes))
}
