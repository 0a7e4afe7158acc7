use crate::wire::{
    ChatMessage, ContentPart, CssRequest, EnhanceRequest, FixRequest, GenerationRequest, HtmlRequest,
    MessageContent, ReactRequest, Role, WebsiteRequest,
};

pub const IMAGE_PLACEHOLDER: &str =
    "[IMAGE: Web UI Screenshot - Analyze layout, colors, components, and structure]";

/// Appended after the conversation so the model answers in the assistant voice.
pub const ASSISTANT_CUE: &str =
    "Assistant: I'll create clean, professional web code based on the requirements. Let me generate:";

const TURN_SEPARATOR: &str = "\n\n";

/// System instruction plus user prompt for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system.clone()), ChatMessage::user(self.user.clone())]
    }
}

pub fn build(req: &GenerationRequest) -> Prompt {
    match req {
        GenerationRequest::Html(r) => Prompt { system: web_developer_system(), user: html_prompt(r) },
        GenerationRequest::Css(r) => Prompt { system: css_system(), user: css_prompt(r) },
        GenerationRequest::React(r) => Prompt { system: react_system(), user: react_prompt(r) },
        GenerationRequest::Enhance(r) => Prompt { system: web_developer_system(), user: enhance_prompt(r) },
        GenerationRequest::Fix(r) => Prompt { system: web_developer_system(), user: fix_prompt(r) },
        GenerationRequest::Website(r) => Prompt { system: web_developer_system(), user: website_prompt(r) },
    }
}

/// Small local models follow short, direct instructions better.
pub fn adapt_for_model(prompt: &str, model: &str) -> String {
    let m = model.to_ascii_lowercase();
    if m.contains("3b") || m.contains("1b") {
        format!("Task: {prompt}\n\nGenerate clean, working code. Be concise but complete.")
    } else {
        prompt.to_string()
    }
}

/// Render a conversation as a single prompt: `Role: content` turns joined by a
/// blank line, closed by [`ASSISTANT_CUE`].
pub fn format_conversation(messages: &[ChatMessage]) -> String {
    let mut parts: Vec<String> = messages
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), flatten_content(&m.content)))
        .collect();
    parts.push(ASSISTANT_CUE.to_string());
    parts.join(TURN_SEPARATOR)
}

pub fn flatten_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(t) => t.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => text.as_str(),
                ContentPart::ImageUrl { .. } => IMAGE_PLACEHOLDER,
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

fn web_developer_system() -> String {
    r#"You are an expert web developer specializing in creating clean, modern HTML with CSS.
When generating code:
- Use semantic HTML5 elements
- Include responsive CSS with Flexbox/Grid
- Use modern color schemes and typography
- Ensure accessibility with proper ARIA labels
- Include placeholder content that makes sense
- Generate complete, runnable code
- Keep code clean and well-structured"#
        .to_string()
}

fn css_system() -> String {
    r#"You are a CSS expert focused on modern, responsive design.
When creating styles:
- Use CSS Grid and Flexbox for layouts
- Implement mobile-first responsive design
- Use CSS custom properties (variables) for consistency
- Include hover effects and smooth transitions
- Follow modern design principles (good contrast, spacing)
- Use semantic class names following BEM methodology"#
        .to_string()
}

fn react_system() -> String {
    r#"You are a React developer creating functional components with hooks.
When building components:
- Use functional components with useState/useEffect hooks
- Implement proper TypeScript types
- Include JSX with semantic HTML
- Use CSS modules or styled-components for styling
- Include proper event handlers and state management
- Add PropTypes or TypeScript interfaces for type safety"#
        .to_string()
}

fn html_prompt(r: &HtmlRequest) -> String {
    format!(
        r#"Create a complete HTML page based on this description:

{description}

{additional}

Requirements:
- Use semantic HTML5 elements (header, nav, main, section, footer, etc.)
- Include responsive CSS with mobile-first approach
- Use modern design with good color scheme and typography
- Include proper meta tags and structure
- Make it visually appealing with CSS Grid/Flexbox
- Add some interactive elements (hover effects, etc.)
- Use placeholder content that fits the theme
- Ensure the page is ready to use without external dependencies

Output format:
Return the complete HTML document in one ```html code block, then the complete stylesheet in one ```css code block."#,
        description = r.description.trim(),
        additional = r.additional_requirements.trim(),
    )
}

fn css_prompt(r: &CssRequest) -> String {
    let html_context = if r.existing_html.trim().is_empty() {
        String::new()
    } else {
        format!("\n\nExisting HTML structure:\n```html\n{}\n```", r.existing_html.trim())
    };
    format!(
        r#"Create CSS styles to match this design mockup:

{mockup}{html_context}

Requirements:
- Create modern, responsive CSS
- Use CSS Grid and Flexbox for layouts
- Implement mobile-first responsive design
- Use proper color scheme with good contrast
- Include typography that matches the design
- Add hover effects and smooth transitions
- Use CSS custom properties for consistency

Output format:
Return only the CSS code in one ```css code block."#,
        mockup = r.mockup_description.trim(),
    )
}

fn react_prompt(r: &ReactRequest) -> String {
    let props_text = if r.props.is_empty() {
        "Determine props based on the requirements".to_string()
    } else {
        format!("Props needed: {}", r.props.join(", "))
    };
    format!(
        r#"Create a React functional component based on this description:

{description}

{props_text}

Requirements:
- Use React functional component with hooks (useState, useEffect as needed)
- Include TypeScript types/interfaces
- Use semantic HTML structure
- Include CSS-in-JS or CSS modules for styling
- Implement proper event handlers
- Add error handling where appropriate
- Include JSDoc comments for the component

Output format:
Return the complete component in one ```tsx code block."#,
        description = r.component_description.trim(),
    )
}

fn enhance_prompt(r: &EnhanceRequest) -> String {
    format!(
        r#"Enhance this existing web code based on the following request:

Enhancement request: {request}

Existing code:
```
{code}
```

Requirements:
- Improve the existing code without breaking functionality
- Add the requested enhancements
- Maintain existing working features
- Keep the code clean and well-organized
- Ensure responsive design is maintained
- Add comments for new functionality

Output format:
Return the complete enhanced code in one fenced code block tagged with its language."#,
        request = r.enhancement_request.trim(),
        code = r.existing_code.trim_end(),
    )
}

fn fix_prompt(r: &FixRequest) -> String {
    format!(
        r#"Fix the issues in this web code:

Issues to fix: {issues}

Problematic code:
```
{code}
```

Requirements:
- Fix all identified issues
- Maintain existing functionality where possible
- Add error handling if needed
- Ensure cross-browser compatibility
- Add comments explaining fixes

Output format:
Return the complete fixed code in one fenced code block tagged with its language."#,
        issues = r.issues_description.trim(),
        code = r.problematic_code.trim_end(),
    )
}

fn website_prompt(r: &WebsiteRequest) -> String {
    let pages_text = if r.pages.is_empty() {
        "Determine pages based on the requirements".to_string()
    } else {
        format!("Pages needed: {}", r.pages.join(", "))
    };
    format!(
        r#"Create a complete website based on this description:

{description}

{pages_text}

Requirements:
- Create a multi-page website with navigation
- Use consistent design across all pages
- Implement responsive design for mobile/desktop
- Include proper HTML structure with semantic elements
- Share one stylesheet named style.css between all pages
- Add proper meta tags and SEO considerations
- Include placeholder content that fits the theme

Output format:
For every file write its filename on its own line (for example `index.html`), then the file content in a fenced code block tagged with its language (```html, ```css, ```js)."#,
        description = r.site_description.trim(),
    )
}
