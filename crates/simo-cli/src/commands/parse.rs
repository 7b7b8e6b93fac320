use simo_config::SimoConfig;
use simo_nlu::Understanding;
use simo_runtime::nlu_from_config;

pub(super) async fn cmd_parse(config: SimoConfig, text: String, json: bool) -> simo_core::Result<()> {
    let nlu = nlu_from_config(&config, None)?;
    let result = nlu.understand(&text).await;

    if json {
        let body = match &result.understanding {
            Understanding::Intent(intent) => serde_json::json!({ "intent": intent }),
            Understanding::Suggestions(steps) => serde_json::json!({ "suggestions": steps }),
            Understanding::Nothing => serde_json::json!({}),
        };
        let out = serde_json::json!({
            "text": text,
            "source": result.source.to_string(),
            "confidence": result.confidence,
            "understanding": body,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("🗣️  {text}");
    println!("   Source: {}", result.source);
    println!("   Confidence: {:.2}", result.confidence);
    match &result.understanding {
        Understanding::Intent(intent) => {
            let command = intent.command().unwrap_or_else(|| "-".to_string());
            println!("   Intent: {} ({command})", intent.kind());
        }
        Understanding::Suggestions(steps) => {
            println!("   Sequence:");
            for (i, step) in steps.iter().enumerate() {
                let command = step.action.command().unwrap_or_else(|| "-".to_string());
                println!("     {}. {} ({command})", i + 1, step.raw_text);
            }
        }
        Understanding::Nothing => println!("   Not understood"),
    }
    Ok(())
}
