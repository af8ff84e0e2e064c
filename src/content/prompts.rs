//! The research-then-write crew.

use std::sync::Arc;

use crate::agents::{Agent, Crew, Task};
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::tools::Tool;

pub const RESEARCHER_ROLE: &str = "Senior Research Analyst";
pub const WRITER_ROLE: &str = "Content Writer";

const RESEARCHER_GOAL: &str =
    "Research, analyze, and synthesize comprehensive information on {topic} from reliable web sources";

const RESEARCHER_BACKSTORY: &str = "You're an expert research analyst with advanced web research skills. \
You excel at finding, analyzing, and synthesizing information from across the internet using search tools. \
You're skilled at fact-checking, cross-referencing information, and identifying key patterns and insights. \
You provide well-organized research briefs with proper citations and source verification. \
Your analysis includes both raw data and interpreted insights, making complex information accessible and actionable.";

const WRITER_GOAL: &str =
    "Transform research findings into engaging blog posts while maintaining accuracy";

const WRITER_BACKSTORY: &str = "You're a skilled content writer specialized in creating engaging, \
accessible content from technical research. You work closely with the Senior Research Analyst and excel at \
maintaining the perfect balance between accuracy and readability. You're skilled at identifying key takeaways, \
crafting compelling headlines, and writing clear, concise content that resonates with the target audience. \
Your writing is well-structured and easy to understand.";

const RESEARCH_DESCRIPTION: &str = "1. Conduct comprehensive research on {topic}, including:
    - Recent developments and news
    - Key industry trends and innovations
    - Expert opinions and analyses
    - Statistical data and market insights
2. Evaluate source credibility and fact-check all information
3. Organize findings into a structured research brief
4. Include all relevant citations and sources";

const RESEARCH_EXPECTED_OUTPUT: &str = "A detailed research report containing:
- Executive summary of key findings
- Comprehensive analysis of current trends and developments
- List of verified facts and statistics
- All citations and links to original sources
- Clear categorization of main themes and patterns
Please format with clear sections and bullet points for easy reference.";

const WRITING_DESCRIPTION: &str = "Using the research brief provided, create an engaging blog post that:
1. Transforms technical information into accessible content
2. Maintains all factual accuracy and citations from the research
3. Includes:
    - Attention-grabbing introduction
    - Well-structured body sections with clear headings
    - Compelling conclusion
4. Preserves all source citations in [Source: URL] format
5. Includes a References section at the end";

const WRITING_EXPECTED_OUTPUT: &str = "A polished blog post in markdown format that:
- Engages readers while maintaining accuracy
- Contains properly structured sections
- Includes inline citations hyperlinked to the original source URL
- Presents information in an accessible yet informative way
- Follows proper markdown formatting, using H1 for the title and H3 for the sub-sections";

pub struct CrewSettings {
    pub temperature: f32,
    pub verbose: bool,
    pub max_iterations: usize,
}

/// Two agents, two tasks, run in sequence. Placeholders are filled at kickoff.
pub fn build_content_crew(
    llm: Arc<dyn LanguageModel>,
    tools: Vec<Arc<dyn Tool>>,
    settings: &CrewSettings,
) -> Result<Crew> {
    let senior_research_analyst = Arc::new(
        Agent::builder(RESEARCHER_ROLE, llm.clone())
            .goal(RESEARCHER_GOAL)
            .backstory(RESEARCHER_BACKSTORY)
            .allow_delegation(false)
            .verbose(settings.verbose)
            .max_iterations(settings.max_iterations)
            .temperature(settings.temperature)
            .tools(tools.clone())
            .build()?,
    );

    let content_writer = Arc::new(
        Agent::builder(WRITER_ROLE, llm)
            .goal(WRITER_GOAL)
            .backstory(WRITER_BACKSTORY)
            .allow_delegation(false)
            .max_iterations(settings.max_iterations)
            .temperature(settings.temperature)
            .tools(tools)
            .build()?,
    );

    let research_task = Task::new(
        RESEARCH_DESCRIPTION,
        RESEARCH_EXPECTED_OUTPUT,
        senior_research_analyst.clone(),
    );
    let writing_task = Task::new(
        WRITING_DESCRIPTION,
        WRITING_EXPECTED_OUTPUT,
        content_writer.clone(),
    );

    Ok(Crew::new(
        vec![senior_research_analyst, content_writer],
        vec![research_task, writing_task],
    )?
    .verbose(settings.verbose))
}
