use crate::platform::{Platform, Scope};

/// System message sent with every chat request.
pub const SYSTEM_PROMPT: &str = "You are a concise analytics assistant. Provide brief, actionable \
insights in 2-3 sentences maximum. Focus on key findings and immediate recommendations. Use HTML \
formatting: <strong>bold</strong>, <ul><li>bullet points</li></ul>, <br/> for line breaks. Be \
direct and practical. Base your analysis on the provided context data from the analytics dashboard.";

/// Upper bound on parsed question suggestions.
pub const MAX_SUGGESTIONS: usize = 5;

fn focus_points(platform: Platform) -> (&'static str, &'static [&'static str], &'static str) {
    match platform {
        Platform::Datadog => (
            "Datadog metrics",
            &[
                "Performance trends and patterns",
                "Anomalies or unusual behavior",
                "Resource utilization insights",
                "Recommendations for optimization",
            ],
            "Provide actionable insights in a clear, professional format.",
        ),
        Platform::Github => (
            "GitHub analytics",
            &[
                "Development velocity and trends",
                "Code review patterns",
                "Team productivity metrics",
                "Pull request quality indicators",
                "Recommendations for process improvement",
            ],
            "Provide insights about development workflow and team performance.",
        ),
        Platform::AzureDevOps => (
            "Azure DevOps",
            &[
                "Work item completion trends",
                "Development cycle insights",
                "Team collaboration patterns",
                "Project progress indicators",
                "Process optimization opportunities",
            ],
            "Provide actionable recommendations for project management and development workflow.",
        ),
        Platform::Figma => (
            "Figma design",
            &[
                "Design collaboration patterns",
                "Project organization insights",
                "Team design workflow",
                "Asset management efficiency",
                "Design system utilization",
            ],
            "Provide insights about design process and collaboration effectiveness.",
        ),
    }
}

/// Instruction for answering a free-text question about `scope`.
pub fn analysis_instruction(scope: Scope, question: &str) -> String {
    match scope {
        Scope::One(platform) => {
            let (label, points, closing) = focus_points(platform);
            let mut out = format!(
                "Analyze the following {} data and answer the user's question: \"{}\"\n\nFocus on:\n",
                label, question
            );
            for point in points {
                out.push_str(&format!("- {}\n", point));
            }
            out.push('\n');
            out.push_str(closing);
            out
        }
        Scope::All => {
            let mut out = format!(
                "Analyze the following comprehensive analytics data from multiple sources and answer the user's question: \"{}\"\n\nData sources include:\n",
                question
            );
            for platform in Platform::ALL {
                out.push_str(&format!("- {}\n", source_line(platform)));
            }
            out.push_str(
                "\nProvide cross-platform insights, identify correlations between different data sources, \
                 and give strategic recommendations for improving overall development and design processes.",
            );
            out
        }
    }
}

/// Instruction for an executive summary of `scope`.
pub fn summary_instruction(scope: Scope) -> String {
    format!(
        "Provide a concise executive summary of the {} data below.\n\n\
         Include:\n- Key metrics and trends\n- Notable patterns or anomalies\n- Top insights\n- Brief recommendations\n\n\
         Keep it professional and actionable for management review.",
        scope_label(scope)
    )
}

/// Instruction asking for follow-up questions worth asking about `scope`.
pub fn suggestion_instruction(scope: Scope) -> String {
    format!(
        "Based on the {} data available, suggest {} relevant questions that would provide valuable insights.\n\n\
         The questions should be:\n- Specific to the data available\n- Actionable for decision-making\n\
         - Cover different aspects (performance, trends, optimization, etc.)\n- Professional and business-focused\n\n\
         Return only the questions, one per line.",
        scope_label(scope),
        MAX_SUGGESTIONS
    )
}

/// Keep non-empty lines that contain a question mark, at most [`MAX_SUGGESTIONS`].
pub fn parse_suggestions(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains('?'))
        .map(str::to_string)
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Canned reply used when no model is configured or the model is unreachable.
pub fn fallback_response(question: &str) -> String {
    let mut out = format!(
        "<strong>Analytics Bot Response</strong><br/><br/>I can see you're asking about: \"{}\"<br/><br/>\
         <strong>Note</strong>: No LLM provider is currently available. To enable AI-powered analysis, \
         configure one of the following:<ul>\
         <li><strong>OpenAI</strong>: set <code>LLM_PROVIDER=openai</code> and <code>OPENAI_API_KEY</code></li>\
         <li><strong>Anthropic</strong>: set <code>LLM_PROVIDER=anthropic</code> and <code>ANTHROPIC_API_KEY</code></li>\
         <li><strong>Azure OpenAI</strong>: set <code>LLM_PROVIDER=azure</code>, <code>AZURE_OPENAI_ENDPOINT</code>, \
         <code>AZURE_OPENAI_KEY</code> and <code>AZURE_OPENAI_DEPLOYMENT</code></li></ul>\
         <strong>Available Data Sources</strong>:<ul>",
        question
    );
    for platform in Platform::ALL {
        out.push_str(&format!("<li>{}</li>", source_line(platform)));
    }
    out.push_str("</ul>");
    out
}

fn source_line(platform: Platform) -> &'static str {
    match platform {
        Platform::Datadog => "Datadog monitoring, logs and metrics",
        Platform::Github => "GitHub pull request analytics",
        Platform::AzureDevOps => "Azure DevOps work items and pull requests",
        Platform::Figma => "Figma design collaboration",
    }
}

fn scope_label(scope: Scope) -> &'static str {
    match scope {
        Scope::All => "cross-platform",
        Scope::One(p) => p.display_name(),
    }
}
